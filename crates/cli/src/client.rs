//! API client for the compose-status server

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use url::Url;

/// API client for the status server
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        // /healthz answers 503 with a full body when a source is unhealthy
        let status = response.status();
        if !status.is_success() && status != reqwest::StatusCode::SERVICE_UNAVAILABLE {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }

    pub async fn workloads(&self) -> Result<WorkloadList> {
        self.get("api/v1/workloads").await
    }

    pub async fn stats(&self) -> Result<StatsReport> {
        self.get("api/v1/stats").await
    }

    pub async fn snapshot(&self) -> Result<BTreeMap<String, Workload>> {
        self.get("api/v1/snapshot").await
    }

    pub async fn health(&self) -> Result<HealthReport> {
        self.get("healthz").await
    }
}

// API response types

/// One tracked workload, in the server's persisted layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Workload {
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub link: String,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub is_down: bool,
    pub project: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadList {
    pub tracked: usize,
    pub down: usize,
    pub groups: BTreeMap<String, Vec<Workload>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HostStats {
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
    pub mem_used: u64,
    pub mem_total: u64,
    pub cpu_percent: f64,
    pub cpu_temp: Option<f64>,
    pub uptime_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub at: DateTime<Utc>,
    pub cpu_percent: f64,
    pub cpu_temp: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsReport {
    pub stats: HostStats,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub history: Vec<HistoryPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentReport {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success_timestamp: Option<i64>,
    pub last_check_timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub components: HashMap<String, ComponentReport>,
}
