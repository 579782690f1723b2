//! Docker engine workload source
//!
//! Lists running containers through the engine API (`GET /containers/json`),
//! either over the local unix socket or over TCP.

use super::WorkloadSource;
use crate::error::ScanError;
use crate::models::RawObservation;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::debug;
use url::Url;

/// Engine address used when `DOCKER_HOST` is not set
pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";

const SOURCE_NAME: &str = "docker engine";
const LIST_PATH: &str = "containers/json";

/// Largest engine response read before the listing is rejected (16 MiB)
pub const MAX_RESPONSE_BYTES: u64 = 16 * 1024 * 1024;

/// Where the engine API is reachable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerEndpoint {
    Unix(PathBuf),
    Http(Url),
}

impl DockerEndpoint {
    /// Parse a `DOCKER_HOST` style address (`unix://`, `tcp://`, `http(s)://`)
    pub fn parse(host: &str) -> Result<Self> {
        if let Some(path) = host.strip_prefix("unix://") {
            anyhow::ensure!(!path.is_empty(), "Empty unix socket path in {:?}", host);
            return Ok(Self::Unix(PathBuf::from(path)));
        }

        let http = match host.strip_prefix("tcp://") {
            Some(rest) => format!("http://{}", rest),
            None => host.to_string(),
        };
        let mut url = Url::parse(&http).with_context(|| format!("Invalid docker host {:?}", host))?;
        anyhow::ensure!(
            matches!(url.scheme(), "http" | "https"),
            "Unsupported docker host scheme {:?}",
            url.scheme()
        );
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(Self::Http(url))
    }
}

/// Container entry as returned by the engine list endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EngineContainer {
    id: String,
    #[serde(default)]
    names: Option<Vec<String>>,
    #[serde(default)]
    labels: Option<HashMap<String, String>>,
    #[serde(default)]
    status: String,
}

impl From<EngineContainer> for RawObservation {
    fn from(container: EngineContainer) -> Self {
        RawObservation {
            id: container.id,
            // the engine reports names as "/name"
            names: container
                .names
                .unwrap_or_default()
                .into_iter()
                .map(|name| name.trim_start_matches('/').to_string())
                .filter(|name| !name.is_empty())
                .collect(),
            labels: container.labels.unwrap_or_default(),
            status: container.status,
        }
    }
}

/// Workload source backed by the Docker engine API
pub struct DockerSource {
    endpoint: DockerEndpoint,
    timeout: Duration,
    max_response_bytes: u64,
    http: reqwest::Client,
}

impl DockerSource {
    pub fn new(endpoint: DockerEndpoint, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            endpoint,
            timeout,
            max_response_bytes: MAX_RESPONSE_BYTES,
            http,
        })
    }

    /// Build from a `DOCKER_HOST` style address
    pub fn from_host(host: &str, timeout: Duration) -> Result<Self> {
        Self::new(DockerEndpoint::parse(host)?, timeout)
    }

    /// Cap on the size of one engine response
    pub fn with_max_response_bytes(mut self, limit: u64) -> Self {
        self.max_response_bytes = limit;
        self
    }

    pub fn endpoint(&self) -> &DockerEndpoint {
        &self.endpoint
    }

    async fn fetch_list(&self) -> Result<Vec<u8>, ScanError> {
        match &self.endpoint {
            DockerEndpoint::Unix(path) => {
                let request = unix_get(path, LIST_PATH, self.max_response_bytes);
                let raw = tokio::time::timeout(self.timeout, request)
                    .await
                    .map_err(|_| ScanError::unavailable(SOURCE_NAME, "request timed out"))?
                    .map_err(|e| ScanError::unavailable(SOURCE_NAME, format!("{:#}", e)))?;
                let (status, body) = split_http_response(&raw)
                    .map_err(|e| ScanError::unavailable(SOURCE_NAME, e))?;
                if status != 200 {
                    return Err(ScanError::unavailable(
                        SOURCE_NAME,
                        format!("engine answered HTTP {}", status),
                    ));
                }
                Ok(body.to_vec())
            }
            DockerEndpoint::Http(base) => {
                let url = base
                    .join(LIST_PATH)
                    .map_err(|e| ScanError::unavailable(SOURCE_NAME, e))?;
                let response = self
                    .http
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| ScanError::unavailable(SOURCE_NAME, e))?;
                if !response.status().is_success() {
                    return Err(ScanError::unavailable(
                        SOURCE_NAME,
                        format!("engine answered HTTP {}", response.status()),
                    ));
                }
                if response
                    .content_length()
                    .is_some_and(|len| len > self.max_response_bytes)
                {
                    return Err(self.oversized());
                }
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| ScanError::unavailable(SOURCE_NAME, e))?;
                if body.len() as u64 > self.max_response_bytes {
                    return Err(self.oversized());
                }
                Ok(body.to_vec())
            }
        }
    }
}

impl DockerSource {
    fn oversized(&self) -> ScanError {
        ScanError::unavailable(
            SOURCE_NAME,
            format!("response exceeds {} bytes", self.max_response_bytes),
        )
    }
}

#[async_trait]
impl WorkloadSource for DockerSource {
    async fn list_workloads(&self) -> Result<Vec<RawObservation>, ScanError> {
        let body = self.fetch_list().await?;
        let observations = parse_container_list(&body)?;
        debug!(count = observations.len(), "Listed running containers");
        Ok(observations)
    }
}

/// Decode the body of `GET /containers/json`
pub(crate) fn parse_container_list(body: &[u8]) -> Result<Vec<RawObservation>, ScanError> {
    let containers: Vec<EngineContainer> = serde_json::from_slice(body).map_err(|e| {
        ScanError::unavailable(SOURCE_NAME, format!("undecodable container list: {}", e))
    })?;
    Ok(containers.into_iter().map(RawObservation::from).collect())
}

/// Issue an HTTP/1.0 GET over the engine's unix socket.
///
/// HTTP/1.0 keeps the engine from chunking the body and makes it close the
/// connection once the response is written. At most `limit` bytes are read.
async fn unix_get(socket: &std::path::Path, path: &str, limit: u64) -> Result<Vec<u8>> {
    let mut stream = UnixStream::connect(socket)
        .await
        .with_context(|| format!("Failed to connect to {}", socket.display()))?;

    let request = format!(
        "GET /{} HTTP/1.0\r\nHost: docker\r\nAccept: application/json\r\n\r\n",
        path
    );
    stream
        .write_all(request.as_bytes())
        .await
        .context("Failed to send request")?;

    let mut raw = Vec::new();
    stream
        .take(limit.saturating_add(1))
        .read_to_end(&mut raw)
        .await
        .context("Failed to read response")?;
    anyhow::ensure!(
        raw.len() as u64 <= limit,
        "response exceeds {} bytes",
        limit
    );
    Ok(raw)
}

/// Split a raw HTTP response into its status code and body
fn split_http_response(raw: &[u8]) -> Result<(u16, &[u8]), String> {
    let header_end = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .ok_or_else(|| "truncated HTTP response".to_string())?;
    let head = std::str::from_utf8(&raw[..header_end])
        .map_err(|_| "non UTF-8 response headers".to_string())?;

    let status_line = head.lines().next().unwrap_or_default();
    let mut parts = status_line.split_whitespace();
    match parts.next() {
        Some(version) if version.starts_with("HTTP/") => {}
        _ => return Err(format!("invalid status line {:?}", status_line)),
    }
    let status = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| format!("invalid status line {:?}", status_line))?;

    Ok((status, &raw[header_end + 4..]))
}
