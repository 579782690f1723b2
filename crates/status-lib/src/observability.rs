//! Observability infrastructure for the status server
//!
//! Provides:
//! - Prometheus metrics (scan latency, tracked workloads, source errors)
//! - Structured logging of scan cycles and workload transitions

use crate::presence::MergeReport;
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_gauge, Gauge,
    Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Scan latency buckets (in seconds); a cycle is dominated by CPU sampling
const SCAN_LATENCY_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 7.5, 10.0, 30.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<StatusMetricsInner> = OnceLock::new();

struct StatusMetricsInner {
    scan_latency_seconds: Histogram,
    workloads_tracked: IntGauge,
    workloads_down: IntGauge,
    workload_scan_errors: IntCounter,
    host_scan_errors: IntCounter,
    workloads_expired: IntCounter,
    host_cpu_percent: Gauge,
}

impl StatusMetricsInner {
    fn new() -> Self {
        Self {
            scan_latency_seconds: register_histogram!(
                "compose_status_scan_latency_seconds",
                "Time spent on one scan cycle",
                SCAN_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register scan_latency_seconds"),

            workloads_tracked: register_int_gauge!(
                "compose_status_workloads_tracked",
                "Number of workloads currently tracked, up or down"
            )
            .expect("Failed to register workloads_tracked"),

            workloads_down: register_int_gauge!(
                "compose_status_workloads_down",
                "Number of tracked workloads missing from the last scan"
            )
            .expect("Failed to register workloads_down"),

            workload_scan_errors: register_int_counter!(
                "compose_status_workload_scan_errors_total",
                "Scan cycles whose workload listing or merge failed"
            )
            .expect("Failed to register workload_scan_errors"),

            host_scan_errors: register_int_counter!(
                "compose_status_host_scan_errors_total",
                "Scan cycles whose host metrics refresh failed"
            )
            .expect("Failed to register host_scan_errors"),

            workloads_expired: register_int_counter!(
                "compose_status_workloads_expired_total",
                "Workloads forgotten after the retention cutoff"
            )
            .expect("Failed to register workloads_expired"),

            host_cpu_percent: register_gauge!(
                "compose_status_host_cpu_percent",
                "Host CPU utilization from the last metrics refresh"
            )
            .expect("Failed to register host_cpu_percent"),
        }
    }
}

/// Handle to the process-wide Prometheus metrics.
///
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct StatusMetrics {
    _private: (),
}

impl Default for StatusMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusMetrics {
    /// Create a new metrics handle (registers the metrics on first call)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(StatusMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &StatusMetricsInner {
        GLOBAL_METRICS.get_or_init(StatusMetricsInner::new)
    }

    pub fn observe_scan_latency(&self, duration_secs: f64) {
        self.inner().scan_latency_seconds.observe(duration_secs);
    }

    pub fn set_workloads(&self, tracked: usize, down: usize) {
        self.inner().workloads_tracked.set(tracked as i64);
        self.inner().workloads_down.set(down as i64);
    }

    pub fn inc_workload_scan_errors(&self) {
        self.inner().workload_scan_errors.inc();
    }

    pub fn inc_host_scan_errors(&self) {
        self.inner().host_scan_errors.inc();
    }

    pub fn add_expired(&self, count: usize) {
        self.inner().workloads_expired.inc_by(count as u64);
    }

    pub fn set_host_cpu(&self, percent: f64) {
        self.inner().host_cpu_percent.set(percent);
    }
}

/// Structured logger for dashboard events
#[derive(Clone)]
pub struct StructuredLogger {
    host_name: String,
}

impl StructuredLogger {
    pub fn new(host_name: impl Into<String>) -> Self {
        Self {
            host_name: host_name.into(),
        }
    }

    pub fn log_startup(&self, version: &str, group_label: &str, restored: usize) {
        info!(
            event = "server_started",
            host = %self.host_name,
            version = %version,
            group_label = %group_label,
            restored_workloads = restored,
            "compose-status started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "server_shutdown",
            host = %self.host_name,
            reason = %reason,
            "compose-status shutting down"
        );
    }

    /// Log the workload transitions of one merge
    pub fn log_merge(&self, report: &MergeReport) {
        for id in &report.appeared {
            info!(event = "workload_appeared", host = %self.host_name, workload = %id, "Workload appeared");
        }
        for id in &report.recovered {
            info!(event = "workload_recovered", host = %self.host_name, workload = %id, "Workload is up again");
        }
        for id in &report.went_down {
            warn!(event = "workload_down", host = %self.host_name, workload = %id, "Workload went down");
        }
        for id in &report.expired {
            info!(event = "workload_expired", host = %self.host_name, workload = %id, "Workload forgotten after retention cutoff");
        }
    }

    pub fn log_scan_failure(&self, source: &str, error: &dyn std::fmt::Display) {
        warn!(
            event = "scan_failed",
            host = %self.host_name,
            source = %source,
            error = %error,
            "Scan source failed, keeping last known state"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_metrics_creation() {
        let metrics = StatusMetrics::new();
        let again = StatusMetrics::new();

        metrics.observe_scan_latency(0.2);
        metrics.set_workloads(4, 1);
        metrics.inc_workload_scan_errors();
        again.inc_host_scan_errors();
        again.add_expired(2);
        again.set_host_cpu(12.5);

        let families = prometheus::gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "compose_status_workloads_tracked"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-host");
        assert_eq!(logger.host_name, "test-host");
        logger.log_merge(&MergeReport {
            went_down: vec!["grp___a".to_string()],
            ..Default::default()
        });
    }
}
