//! Integration tests for the status server endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, TimeZone, Utc};
use compose_status::api::{create_router, AppState, PageSettings};
use status_lib::{
    health::{components, HealthRegistry, UNHEALTHY_AFTER_FAILURES},
    history::History,
    presence::{DEFAULT_GROUP_LABEL, DEFAULT_RETENTION, TRAEFIK_RULE_LABEL},
    PresenceRegistry, RawObservation, Stats, StatusMetrics, StatusState,
};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

fn observation(group: &str, name: &str, rule: Option<&str>) -> RawObservation {
    let mut labels = HashMap::from([(DEFAULT_GROUP_LABEL.to_string(), group.to_string())]);
    if let Some(rule) = rule {
        labels.insert(TRAEFIK_RULE_LABEL.to_string(), rule.to_string());
    }
    RawObservation {
        id: format!("{group}-{name}"),
        names: vec![name.to_string()],
        labels,
        status: "Up 2 hours".to_string(),
    }
}

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::WORKLOAD_SOURCE).await;
    health_registry.register(components::METRICS_SOURCE).await;

    let state = StatusState::new(
        PresenceRegistry::new(DEFAULT_GROUP_LABEL, DEFAULT_RETENTION),
        History::new(10),
    );
    let app_state = Arc::new(AppState::new(
        state,
        health_registry,
        PageSettings {
            title: "lab <status>".to_string(),
            show_credit: true,
        },
    ));
    let router = create_router(app_state.clone());

    (router, app_state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let (status, body) = get(app, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_index_renders_groups_and_down_marker() {
    let (app, app_state) = setup_test_app().await;
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

    app_state
        .state
        .merge(
            &[
                observation("media", "sonarr", Some("Host:tv.example.com")),
                observation("media", "radarr", None),
            ],
            t0,
        )
        .await
        .unwrap();
    app_state
        .state
        .merge(
            &[observation("media", "sonarr", Some("Host:tv.example.com"))],
            t0 + Duration::minutes(1),
        )
        .await
        .unwrap();

    let (status, body) = get(app, "/").await;
    let html = String::from_utf8(body).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("lab &lt;status&gt;"));
    assert!(html.contains("media"));
    assert!(html.contains("//tv.example.com"));
    assert!(html.contains("sonarr"));
    assert!(html.contains("radarr"));
    assert!(html.contains("last seen"));
    assert!(html.contains("compose-status"));
}

#[tokio::test]
async fn test_workloads_endpoint_reports_groups_and_counts() {
    let (app, app_state) = setup_test_app().await;
    let t0 = Utc::now();

    app_state
        .state
        .merge(
            &[
                observation("web", "nginx", None),
                observation("db", "postgres", None),
            ],
            t0,
        )
        .await
        .unwrap();
    app_state
        .state
        .merge(&[observation("web", "nginx", None)], t0 + Duration::seconds(5))
        .await
        .unwrap();

    let (status, body) = get_json(app, "/api/v1/workloads").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tracked"], 2);
    assert_eq!(body["down"], 1);
    assert_eq!(body["groups"]["web"][0]["Name"], "nginx");
    assert_eq!(body["groups"]["web"][0]["IsDown"], false);
    assert_eq!(body["groups"]["db"][0]["IsDown"], true);
}

#[tokio::test]
async fn test_stats_endpoint_includes_history() {
    let (app, app_state) = setup_test_app().await;
    let stats = Stats {
        load1: 0.5,
        mem_used: 1_000,
        mem_total: 4_000,
        cpu_percent: 12.5,
        cpu_temp: Some(48.0),
        uptime_secs: 3600,
        ..Default::default()
    };
    app_state.state.update_stats(stats, Utc::now()).await;

    let (status, body) = get_json(app, "/api/v1/stats").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["cpu_percent"], 12.5);
    assert_eq!(body["stats"]["mem_total"], 4_000);
    assert!(body["updated_at"].is_string());
    assert_eq!(body["history"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_stats_endpoint_before_first_refresh() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get_json(app, "/api/v1/stats").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["updated_at"].is_null());
    assert!(body["history"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_snapshot_endpoint_uses_resume_layout() {
    let (app, app_state) = setup_test_app().await;
    app_state
        .state
        .merge(&[observation("web", "nginx", None)], Utc::now())
        .await
        .unwrap();

    let (status, body) = get(app, "/api/v1/snapshot").await;
    assert_eq!(status, StatusCode::OK);

    // The exported body must restore into a fresh registry
    let mut restored = PresenceRegistry::default();
    assert_eq!(restored.seed_from_slice(&body).unwrap(), 1);
    assert!(restored.get("web___nginx").is_some());
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let (app, app_state) = setup_test_app().await;
    app_state
        .health_registry
        .record_failure(components::WORKLOAD_SOURCE, "connection refused")
        .await;

    let (status, health) = get_json(app, "/healthz").await;

    // Degraded is still operational
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, app_state) = setup_test_app().await;
    for _ in 0..UNHEALTHY_AFTER_FAILURES {
        app_state
            .health_registry
            .record_failure(components::METRICS_SOURCE, "no cpu reading")
            .await;
    }

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_returns_503_before_first_scan() {
    let (app, _state) = setup_test_app().await;

    let (status, readiness) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);
}

#[tokio::test]
async fn test_readyz_returns_ok_when_ready() {
    let (app, app_state) = setup_test_app().await;
    app_state.health_registry.set_ready(true).await;

    let (status, readiness) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_status_metrics() {
    let (app, _state) = setup_test_app().await;
    StatusMetrics::new().set_workloads(3, 1);

    let (status, body) = get(app, "/metrics").await;
    let text = String::from_utf8(body).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("compose_status_workloads_tracked"));
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let (app, _state) = setup_test_app().await;

    let (status, _) = get(app, "/nope").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
