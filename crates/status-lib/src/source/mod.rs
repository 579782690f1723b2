//! Sources of workload observations and host metrics
//!
//! The scan loop only talks to these traits. The Docker engine adapter lists
//! running containers; the sysinfo adapter samples host load, memory and CPU.

mod docker;
mod host;

pub use docker::{DockerEndpoint, DockerSource, DEFAULT_DOCKER_HOST, MAX_RESPONSE_BYTES};
pub use host::SysinfoSource;

use crate::error::ScanError;
use crate::models::{HostReading, RawObservation};

pub use async_trait::async_trait;

/// Lists the workloads currently running on the host
#[async_trait]
pub trait WorkloadSource: Send + Sync {
    /// Snapshot of running containers
    async fn list_workloads(&self) -> Result<Vec<RawObservation>, ScanError>;
}

/// Reads point-in-time host metrics
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Sample the host; may take as long as the CPU sampling window
    async fn read_host(&self) -> Result<HostReading, ScanError>;
}
