//! Errors raised while scanning workloads and host metrics

use thiserror::Error;

/// Errors produced during a single scan cycle.
///
/// None of these ever reach the reporting surface: the scan loop logs them
/// and the dashboard keeps serving the last known state.
#[derive(Debug, Error)]
pub enum ScanError {
    /// A workload carried the group label but no name to derive an identity from
    #[error("workload {id:?} has the group label but no name")]
    MalformedObservation { id: String },

    /// The workload engine or the host could not be queried
    #[error("{source_name} unavailable: {message}")]
    SourceUnavailable {
        source_name: &'static str,
        message: String,
    },

    /// The metrics source answered with an unexpected shape
    #[error("malformed host metrics: {0}")]
    MalformedMetrics(String),

    /// A persisted registry snapshot could not be read or written
    #[error("invalid registry snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl ScanError {
    pub fn unavailable(source_name: &'static str, message: impl ToString) -> Self {
        Self::SourceUnavailable {
            source_name,
            message: message.to_string(),
        }
    }
}
