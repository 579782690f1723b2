//! Core library for compose-status
//!
//! This crate provides the core functionality for:
//! - Presence tracking of compose workloads (up, down, forgotten)
//! - Workload and host metric sources (Docker engine, sysinfo)
//! - The periodic scan loop feeding shared dashboard state
//! - Page rendering, health checks and observability

pub mod error;
pub mod health;
pub mod history;
pub mod models;
pub mod observability;
pub mod presence;
pub mod render;
pub mod scan;
pub mod source;
pub mod state;

pub use error::ScanError;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{StatusMetrics, StructuredLogger};
pub use presence::{MergeReport, PresenceRegistry};
pub use state::StatusState;
