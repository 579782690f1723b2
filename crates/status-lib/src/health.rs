//! Health check infrastructure for the status server
//!
//! Tracks whether the workload and metrics sources answered on recent scan
//! cycles. A source that keeps failing degrades the service and eventually
//! marks it unhealthy; the dashboard itself keeps serving the last known state.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Consecutive failures after which a component is reported unhealthy
pub const UNHEALTHY_AFTER_FAILURES: u32 = 3;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Last scan against this source succeeded
    Healthy,
    /// Recent scans failed, data may be stale
    Degraded,
    /// The source has been failing for several cycles
    Unhealthy,
}

impl ComponentStatus {
    /// Returns true if the component is at least partially operational
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

/// Health of one scan source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success_timestamp: Option<i64>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    /// Freshly registered component; nothing has been checked yet
    pub fn pending() -> Self {
        Self {
            status: ComponentStatus::Healthy,
            message: None,
            consecutive_failures: 0,
            last_success_timestamp: None,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    fn succeeded(&mut self) {
        let now = chrono::Utc::now().timestamp();
        self.status = ComponentStatus::Healthy;
        self.message = None;
        self.consecutive_failures = 0;
        self.last_success_timestamp = Some(now);
        self.last_check_timestamp = now;
    }

    fn failed(&mut self, message: String) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.status = if self.consecutive_failures >= UNHEALTHY_AFTER_FAILURES {
            ComponentStatus::Unhealthy
        } else {
            ComponentStatus::Degraded
        };
        self.message = Some(message);
        self.last_check_timestamp = chrono::Utc::now().timestamp();
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across all components
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        let mut has_degraded = false;

        for health in components.values() {
            match health.status {
                ComponentStatus::Unhealthy => return ComponentStatus::Unhealthy,
                ComponentStatus::Degraded => has_degraded = true,
                ComponentStatus::Healthy => {}
            }
        }

        if has_degraded {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        }
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const WORKLOAD_SOURCE: &str = "workload_source";
    pub const METRICS_SOURCE: &str = "metrics_source";
}

/// Health registry shared by the scan loop and the API
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            ready: Arc::new(RwLock::new(false)),
        }
    }

    /// Register a component before its first check
    pub async fn register(&self, name: &str) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), ComponentHealth::pending());
    }

    /// Record a successful check; registers the component if needed
    pub async fn record_success(&self, name: &str) {
        let mut components = self.components.write().await;
        components
            .entry(name.to_string())
            .or_insert_with(ComponentHealth::pending)
            .succeeded();
    }

    /// Record a failed check; registers the component if needed
    pub async fn record_failure(&self, name: &str, message: impl Into<String>) {
        let mut components = self.components.write().await;
        components
            .entry(name.to_string())
            .or_insert_with(ComponentHealth::pending)
            .failed(message.into());
    }

    /// Set readiness status
    pub async fn set_ready(&self, ready: bool) {
        let mut r = self.ready.write().await;
        *r = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = *self.ready.read().await;
        let health = self.health().await;

        if !ready {
            ReadinessResponse {
                ready: false,
                reason: Some("First scan cycle not completed".to_string()),
            }
        } else if !health.status.is_operational() {
            ReadinessResponse {
                ready: false,
                reason: Some("Scan source unhealthy".to_string()),
            }
        } else {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_single_failure_degrades() {
        let registry = HealthRegistry::new();
        registry.register(components::WORKLOAD_SOURCE).await;
        registry.register(components::METRICS_SOURCE).await;

        registry
            .record_failure(components::WORKLOAD_SOURCE, "connection refused")
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        let workload = &health.components[components::WORKLOAD_SOURCE];
        assert_eq!(workload.consecutive_failures, 1);
        assert_eq!(workload.message.as_deref(), Some("connection refused"));
    }

    #[tokio::test]
    async fn test_repeated_failures_turn_unhealthy() {
        let registry = HealthRegistry::new();
        for _ in 0..UNHEALTHY_AFTER_FAILURES {
            registry
                .record_failure(components::METRICS_SOURCE, "timeout")
                .await;
        }

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_success_resets_failures() {
        let registry = HealthRegistry::new();
        registry
            .record_failure(components::WORKLOAD_SOURCE, "timeout")
            .await;
        registry.record_success(components::WORKLOAD_SOURCE).await;

        let health = registry.health().await;
        let workload = &health.components[components::WORKLOAD_SOURCE];
        assert_eq!(health.status, ComponentStatus::Healthy);
        assert_eq!(workload.consecutive_failures, 0);
        assert!(workload.last_success_timestamp.is_some());
        assert!(workload.message.is_none());
    }

    #[tokio::test]
    async fn test_readiness_not_ready_initially() {
        let registry = HealthRegistry::new();
        let readiness = registry.readiness().await;

        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());
    }

    #[tokio::test]
    async fn test_readiness_not_ready_when_unhealthy() {
        let registry = HealthRegistry::new();
        registry.set_ready(true).await;
        assert!(registry.readiness().await.ready);

        for _ in 0..UNHEALTHY_AFTER_FAILURES {
            registry
                .record_failure(components::WORKLOAD_SOURCE, "down")
                .await;
        }
        assert!(!registry.readiness().await.ready);
    }
}
