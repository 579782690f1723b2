//! HTTP surface: the status page, JSON views, health checks and Prometheus metrics

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use status_lib::{
    health::{ComponentStatus, HealthRegistry},
    history::HistoryPoint,
    render::{render_page, PageView},
    state::StatusState,
    Stats, TrackedWorkload,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Page settings that do not change at runtime
#[derive(Debug, Clone)]
pub struct PageSettings {
    pub title: String,
    pub show_credit: bool,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub state: StatusState,
    pub health_registry: HealthRegistry,
    pub page: PageSettings,
}

impl AppState {
    pub fn new(state: StatusState, health_registry: HealthRegistry, page: PageSettings) -> Self {
        Self {
            state,
            health_registry,
            page,
        }
    }
}

/// Body of `GET /api/v1/workloads`
#[derive(Debug, Serialize)]
pub struct WorkloadsResponse {
    pub tracked: usize,
    pub down: usize,
    pub groups: BTreeMap<String, Vec<TrackedWorkload>>,
}

/// Body of `GET /api/v1/stats`
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub stats: Stats,
    pub updated_at: Option<DateTime<Utc>>,
    pub history: Vec<HistoryPoint>,
}

async fn index(State(app): State<Arc<AppState>>) -> Html<String> {
    let (groups, snapshot) = app.state.view().await;
    Html(render_page(&PageView {
        title: &app.page.title,
        show_credit: app.page.show_credit,
        groups: &groups,
        stats: &snapshot.stats,
        history: &snapshot.history,
        now: Utc::now(),
    }))
}

async fn workloads(State(app): State<Arc<AppState>>) -> Json<WorkloadsResponse> {
    let groups = app.state.workloads_by_group().await;
    let tracked = groups.values().map(Vec::len).sum();
    let down = groups.values().flatten().filter(|w| w.is_down).count();
    Json(WorkloadsResponse {
        tracked,
        down,
        groups,
    })
}

async fn stats(State(app): State<Arc<AppState>>) -> Json<StatsResponse> {
    let snapshot = app.state.stats().await;
    Json(StatsResponse {
        stats: snapshot.stats,
        updated_at: snapshot.updated_at,
        history: snapshot.history,
    })
}

/// Registry in the resume file layout
async fn snapshot(
    State(app): State<Arc<AppState>>,
) -> Json<BTreeMap<String, TrackedWorkload>> {
    Json(app.state.export().await)
}

/// Returns 200 while operational (healthy or degraded), 503 otherwise
async fn healthz(State(app): State<Arc<AppState>>) -> impl IntoResponse {
    let health = app.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Returns 200 once the first scan cycle completed and sources are operational
async fn readyz(State(app): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = app.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/v1/workloads", get(workloads))
        .route("/api/v1/stats", get(stats))
        .route("/api/v1/snapshot", get(snapshot))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve until the shutdown channel fires
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting status server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    info!("Status server stopped");
    Ok(())
}
