//! Scan loop
//!
//! Periodically lists workloads and samples host metrics, feeding the
//! results into the shared dashboard state. The two refreshes are
//! independent: a failure in one is logged and never blocks the other.

use crate::error::ScanError;
use crate::health::{components, HealthRegistry};
use crate::observability::{StatusMetrics, StructuredLogger};
use crate::presence::MergeReport;
use crate::models::Stats;
use crate::source::{MetricsSource, WorkloadSource};
use crate::state::StatusState;
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Default time between two scan cycles
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(5);

/// Outcome of one scan cycle
#[derive(Debug)]
pub struct CycleOutcome {
    pub workloads: Result<MergeReport, ScanError>,
    pub host: Result<Stats, ScanError>,
}

impl CycleOutcome {
    pub fn is_clean(&self) -> bool {
        self.workloads.is_ok() && self.host.is_ok()
    }
}

/// Drives the presence registry and host stats forward on a fixed period
pub struct ScanLoop {
    workloads: Arc<dyn WorkloadSource>,
    host: Arc<dyn MetricsSource>,
    state: StatusState,
    health: HealthRegistry,
    metrics: StatusMetrics,
    logger: StructuredLogger,
    interval: Duration,
}

impl ScanLoop {
    /// Run until the shutdown signal fires.
    ///
    /// Ticks never overlap: a cycle that outlasts the interval delays the
    /// next one instead of queueing a burst.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.interval.as_secs_f64(),
            "Starting scan loop"
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let outcome = self.scan_once().await;
                    cycles += 1;
                    if cycles == 1 {
                        self.health.set_ready(true).await;
                    }
                    debug!(cycle = cycles, clean = outcome.is_clean(), "Scan cycle complete");
                }
                _ = shutdown.recv() => {
                    info!(cycles, "Shutting down scan loop");
                    break;
                }
            }
        }
    }

    /// Run one scan cycle: workloads and host metrics, concurrently
    pub async fn scan_once(&self) -> CycleOutcome {
        let start = Instant::now();
        let (workloads, host) = tokio::join!(self.refresh_workloads(), self.refresh_host());
        self.metrics
            .observe_scan_latency(start.elapsed().as_secs_f64());
        CycleOutcome { workloads, host }
    }

    /// List workloads and merge them; the registry is untouched on failure
    async fn refresh_workloads(&self) -> Result<MergeReport, ScanError> {
        let result = match self.workloads.list_workloads().await {
            Ok(observations) => self.state.merge(&observations, Utc::now()).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(report) => {
                self.health.record_success(components::WORKLOAD_SOURCE).await;
                self.logger.log_merge(report);
                self.metrics.add_expired(report.expired.len());
                let (tracked, down) = self.state.counts().await;
                self.metrics.set_workloads(tracked, down);
            }
            Err(e) => {
                self.health
                    .record_failure(components::WORKLOAD_SOURCE, e.to_string())
                    .await;
                self.metrics.inc_workload_scan_errors();
                self.logger.log_scan_failure(components::WORKLOAD_SOURCE, e);
            }
        }
        result
    }

    /// Sample host metrics and replace the stats snapshot
    async fn refresh_host(&self) -> Result<Stats, ScanError> {
        let result = match self.host.read_host().await {
            Ok(reading) => Stats::try_from(reading),
            Err(e) => Err(e),
        };

        match &result {
            Ok(stats) => {
                self.state.update_stats(*stats, Utc::now()).await;
                self.health.record_success(components::METRICS_SOURCE).await;
                self.metrics.set_host_cpu(stats.cpu_percent);
            }
            Err(e) => {
                self.health
                    .record_failure(components::METRICS_SOURCE, e.to_string())
                    .await;
                self.metrics.inc_host_scan_errors();
                self.logger.log_scan_failure(components::METRICS_SOURCE, e);
            }
        }
        result
    }
}

/// Builder for creating the scan loop
pub struct ScanLoopBuilder {
    workloads: Option<Arc<dyn WorkloadSource>>,
    host: Option<Arc<dyn MetricsSource>>,
    state: Option<StatusState>,
    health: Option<HealthRegistry>,
    logger: Option<StructuredLogger>,
    interval: Duration,
}

impl ScanLoopBuilder {
    pub fn new() -> Self {
        Self {
            workloads: None,
            host: None,
            state: None,
            health: None,
            logger: None,
            interval: DEFAULT_SCAN_INTERVAL,
        }
    }

    pub fn workload_source(mut self, source: Arc<dyn WorkloadSource>) -> Self {
        self.workloads = Some(source);
        self
    }

    pub fn metrics_source(mut self, source: Arc<dyn MetricsSource>) -> Self {
        self.host = Some(source);
        self
    }

    pub fn state(mut self, state: StatusState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn build(self) -> Result<ScanLoop> {
        let workloads = self
            .workloads
            .ok_or_else(|| anyhow::anyhow!("Workload source is required"))?;
        let host = self
            .host
            .ok_or_else(|| anyhow::anyhow!("Metrics source is required"))?;
        let state = self
            .state
            .ok_or_else(|| anyhow::anyhow!("Shared state is required"))?;
        anyhow::ensure!(!self.interval.is_zero(), "Scan interval must be positive");

        Ok(ScanLoop {
            workloads,
            host,
            state,
            health: self.health.unwrap_or_default(),
            metrics: StatusMetrics::new(),
            logger: self
                .logger
                .unwrap_or_else(|| StructuredLogger::new("localhost")),
            interval: self.interval,
        })
    }
}

impl Default for ScanLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::History;
    use crate::models::{HostReading, RawObservation};
    use crate::presence::{PresenceRegistry, DEFAULT_GROUP_LABEL};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Workload source replaying a scripted sequence of answers
    struct ScriptedWorkloads {
        answers: Mutex<Vec<Result<Vec<RawObservation>, ScanError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedWorkloads {
        fn new(mut answers: Vec<Result<Vec<RawObservation>, ScanError>>) -> Self {
            answers.reverse();
            Self {
                answers: Mutex::new(answers),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl WorkloadSource for ScriptedWorkloads {
        async fn list_workloads(&self) -> Result<Vec<RawObservation>, ScanError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answers
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    struct FixedHost {
        cpu: Vec<f64>,
        fail: bool,
    }

    #[async_trait]
    impl MetricsSource for FixedHost {
        async fn read_host(&self) -> Result<HostReading, ScanError> {
            if self.fail {
                return Err(ScanError::unavailable("host metrics", "no /proc"));
            }
            Ok(HostReading {
                load: [1.0, 0.5, 0.25],
                mem_used: 1 << 30,
                mem_total: 4 << 30,
                cpu_percent: self.cpu.clone(),
                uptime_secs: 120,
                cpu_temp: None,
            })
        }
    }

    fn observation(name: &str) -> RawObservation {
        RawObservation {
            id: name.to_string(),
            names: vec![name.to_string()],
            labels: HashMap::from([(DEFAULT_GROUP_LABEL.to_string(), "grp".to_string())]),
            status: "Up".to_string(),
        }
    }

    fn state() -> StatusState {
        StatusState::new(PresenceRegistry::default(), History::new(8))
    }

    fn build(
        workloads: Arc<dyn WorkloadSource>,
        host: Arc<dyn MetricsSource>,
        state: StatusState,
        health: HealthRegistry,
    ) -> ScanLoop {
        ScanLoopBuilder::new()
            .workload_source(workloads)
            .metrics_source(host)
            .state(state)
            .health(health)
            .interval(Duration::from_millis(10))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_sources() {
        assert!(ScanLoopBuilder::new().state(state()).build().is_err());
        assert!(ScanLoopBuilder::new()
            .workload_source(Arc::new(ScriptedWorkloads::new(vec![])))
            .metrics_source(Arc::new(FixedHost { cpu: vec![1.0], fail: false }))
            .state(state())
            .interval(Duration::ZERO)
            .build()
            .is_err());
    }

    #[tokio::test]
    async fn test_scan_once_updates_registry_and_stats() {
        let state = state();
        let scan = build(
            Arc::new(ScriptedWorkloads::new(vec![Ok(vec![observation("a")])])),
            Arc::new(FixedHost { cpu: vec![25.0], fail: false }),
            state.clone(),
            HealthRegistry::new(),
        );

        let outcome = scan.scan_once().await;

        assert!(outcome.is_clean());
        assert_eq!(state.counts().await, (1, 0));
        let stats = state.stats().await;
        assert_eq!(stats.stats.cpu_percent, 25.0);
        assert_eq!(stats.history.len(), 1);
    }

    #[tokio::test]
    async fn test_workload_failure_does_not_block_host_refresh() {
        let state = state();
        let health = HealthRegistry::new();
        let scan = build(
            Arc::new(ScriptedWorkloads::new(vec![
                Ok(vec![observation("a")]),
                Err(ScanError::unavailable("docker engine", "connection refused")),
            ])),
            Arc::new(FixedHost { cpu: vec![10.0], fail: false }),
            state.clone(),
            health.clone(),
        );

        scan.scan_once().await;
        let outcome = scan.scan_once().await;

        assert!(outcome.workloads.is_err());
        assert!(outcome.host.is_ok());
        // the failed cycle leaves the registry as it was: still up
        let groups = state.workloads_by_group().await;
        assert!(!groups["grp"][0].is_down);
        assert_eq!(state.stats().await.history.len(), 2);

        let report = health.health().await;
        assert_eq!(
            report.components[components::WORKLOAD_SOURCE].consecutive_failures,
            1
        );
    }

    #[tokio::test]
    async fn test_host_failure_does_not_block_merge() {
        let state = state();
        let scan = build(
            Arc::new(ScriptedWorkloads::new(vec![Ok(vec![observation("a")])])),
            Arc::new(FixedHost { cpu: vec![10.0], fail: true }),
            state.clone(),
            HealthRegistry::new(),
        );

        let outcome = scan.scan_once().await;

        assert!(outcome.workloads.is_ok());
        assert!(matches!(outcome.host, Err(ScanError::SourceUnavailable { .. })));
        assert_eq!(state.counts().await, (1, 0));
        assert!(state.stats().await.updated_at.is_none());
    }

    #[tokio::test]
    async fn test_malformed_metrics_keep_previous_stats() {
        let state = state();
        let scan = build(
            Arc::new(ScriptedWorkloads::new(vec![])),
            Arc::new(FixedHost { cpu: vec![1.0, 2.0], fail: false }),
            state.clone(),
            HealthRegistry::new(),
        );

        let outcome = scan.scan_once().await;

        assert!(matches!(outcome.host, Err(ScanError::MalformedMetrics(_))));
        assert!(state.stats().await.history.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_observation_discards_cycle() {
        let state = state();
        let mut nameless = observation("b");
        nameless.names.clear();
        let scan = build(
            Arc::new(ScriptedWorkloads::new(vec![
                Ok(vec![observation("a")]),
                Ok(vec![nameless]),
            ])),
            Arc::new(FixedHost { cpu: vec![1.0], fail: false }),
            state.clone(),
            HealthRegistry::new(),
        );

        scan.scan_once().await;
        let outcome = scan.scan_once().await;

        assert!(matches!(
            outcome.workloads,
            Err(ScanError::MalformedObservation { .. })
        ));
        // "a" would have gone down had the cycle been applied
        assert_eq!(state.counts().await, (1, 0));
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let state = state();
        let health = HealthRegistry::new();
        let workloads = Arc::new(ScriptedWorkloads::new(vec![Ok(vec![observation("a")])]));
        let scan = build(
            workloads.clone(),
            Arc::new(FixedHost { cpu: vec![5.0], fail: false }),
            state.clone(),
            health.clone(),
        );

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(scan.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        assert!(workloads.calls.load(Ordering::SeqCst) >= 2);
        assert!(health.readiness().await.ready);
        // "a" was only listed on the first cycle
        assert_eq!(state.counts().await, (1, 1));
    }
}
