//! Core data models for compose-status

use crate::error::ScanError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One container as listed by the workload engine, before any tracking
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawObservation {
    /// Engine instance ID, only used in diagnostics
    pub id: String,
    /// Candidate names; the first one is the display name
    pub names: Vec<String>,
    pub labels: HashMap<String, String>,
    /// Raw status text, e.g. "Up 2 hours (healthy)"
    pub status: String,
}

/// A workload tracked across scans.
///
/// The serialized field names match the resume snapshot layout
/// (`Name`, `Status`, `Link`, `LastSeen`, `IsDown`, `Project`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrackedWorkload {
    pub name: String,
    /// Last observed status, lowercased
    pub status: String,
    /// Routing hostname from the traefik rule label, empty when absent
    #[serde(default)]
    pub link: String,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub is_down: bool,
    pub project: String,
}

impl TrackedWorkload {
    /// Stable identity that survives container recreation
    pub fn identity(&self) -> String {
        crate::presence::workload_identity(&self.project, &self.name)
    }
}

/// Host metrics as reported by a metrics source, before validation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostReading {
    /// Load averages over 1, 5 and 15 minutes
    pub load: [f64; 3],
    pub mem_used: u64,
    pub mem_total: u64,
    /// Aggregate CPU utilization over the sampling window; exactly one value
    pub cpu_percent: Vec<f64>,
    pub uptime_secs: u64,
    pub cpu_temp: Option<f64>,
}

/// Point-in-time host metrics shown on the dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
    pub mem_used: u64,
    pub mem_total: u64,
    pub cpu_percent: f64,
    pub cpu_temp: Option<f64>,
    pub uptime_secs: u64,
}

impl TryFrom<HostReading> for Stats {
    type Error = ScanError;

    fn try_from(reading: HostReading) -> Result<Self, Self::Error> {
        let cpu_percent = match reading.cpu_percent.as_slice() {
            [percent] => *percent,
            other => {
                return Err(ScanError::MalformedMetrics(format!(
                    "expected one cpu percentage, got {}",
                    other.len()
                )))
            }
        };

        Ok(Stats {
            load1: reading.load[0],
            load5: reading.load[1],
            load15: reading.load[2],
            mem_used: reading.mem_used,
            mem_total: reading.mem_total,
            cpu_percent,
            cpu_temp: reading.cpu_temp,
            uptime_secs: reading.uptime_secs,
        })
    }
}
