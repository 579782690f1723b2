//! compose-status - status dashboard for docker compose workloads
//!
//! Scans the local container engine and host metrics on a fixed interval and
//! serves a status page that remembers workloads which went away.

use anyhow::{Context, Result};
use compose_status::{api, config::StatusConfig, shutdown};
use status_lib::{
    health::{components, HealthRegistry},
    history::History,
    observability::StructuredLogger,
    scan::ScanLoopBuilder,
    source::{DockerSource, SysinfoSource},
    PresenceRegistry, StatusState,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = StatusConfig::load()?;
    info!(
        docker_host = %config.docker_host,
        listen_port = config.listen_port,
        "Server configured"
    );

    let mut registry = PresenceRegistry::new(&config.group_label, config.clean_cutoff());
    let restored = registry
        .seed_from_slice(&config.read_resume()?)
        .context("Failed to restore resume file")?;

    let logger = StructuredLogger::new(&config.host_name);
    logger.log_startup(SERVER_VERSION, &config.group_label, restored);

    let health_registry = HealthRegistry::new();
    health_registry.register(components::WORKLOAD_SOURCE).await;
    health_registry.register(components::METRICS_SOURCE).await;

    let state = StatusState::new(registry, History::new(config.history_len));

    let workloads = DockerSource::from_host(&config.docker_host, config.engine_timeout())?;
    let host = SysinfoSource::new(config.cpu_sample_window());

    let scan_loop = ScanLoopBuilder::new()
        .workload_source(Arc::new(workloads))
        .metrics_source(Arc::new(host))
        .state(state.clone())
        .health(health_registry.clone())
        .logger(logger.clone())
        .interval(config.scan_interval())
        .build()?;

    let (shutdown_tx, _) = broadcast::channel(1);

    let scan_handle = tokio::spawn(scan_loop.run(shutdown_tx.subscribe()));

    let app_state = Arc::new(api::AppState::new(
        state,
        health_registry,
        api::PageSettings {
            title: config.page_title.clone(),
            show_credit: config.show_credit,
        },
    ));
    let mut api_handle = tokio::spawn(api::serve(
        config.listen_port,
        app_state,
        shutdown_tx.subscribe(),
    ));

    tokio::select! {
        reason = shutdown::wait_for_signal(tokio::signal::ctrl_c()) => {
            logger.log_shutdown(reason);
        }
        result = &mut api_handle => {
            // the server only returns early on bind or accept failure
            logger.log_shutdown("status server exited");
            let _ = shutdown_tx.send(());
            let _ = scan_handle.await;
            return result.context("Status server task panicked")?;
        }
    }

    let _ = shutdown_tx.send(());
    if let Err(e) = scan_handle.await {
        warn!(error = %e, "Scan loop task failed");
    }
    match api_handle.await {
        Ok(result) => result?,
        Err(e) => warn!(error = %e, "Status server task failed"),
    }

    info!("Shutdown complete");
    Ok(())
}
