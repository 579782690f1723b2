//! Server configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use status_lib::history::DEFAULT_HISTORY_LEN;
use status_lib::presence::{DEFAULT_GROUP_LABEL, DEFAULT_RETENTION};
use status_lib::scan::DEFAULT_SCAN_INTERVAL;
use status_lib::source::DEFAULT_DOCKER_HOST;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming an optional config file
pub const CONFIG_FILE_ENV: &str = "COMPOSE_STATUS_CONFIG";

/// Prefix of environment overrides, e.g. `STATUS_PAGE_TITLE`
pub const ENV_PREFIX: &str = "STATUS";

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StatusConfig {
    /// Port the dashboard listens on
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Seconds between two scan cycles
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,

    /// Seconds after which an unseen workload is forgotten (default: 3 days)
    #[serde(default = "default_clean_cutoff")]
    pub clean_cutoff_secs: u64,

    /// Title shown on the page
    #[serde(default = "default_page_title")]
    pub page_title: String,

    /// Label whose value groups workloads
    #[serde(default = "default_group_label")]
    pub group_label: String,

    /// Show the credit line at the bottom of the page
    #[serde(default)]
    pub show_credit: bool,

    /// Registry snapshot restored at startup
    #[serde(default)]
    pub resume_path: Option<PathBuf>,

    /// Docker engine address
    #[serde(default = "default_docker_host")]
    pub docker_host: String,

    /// Timeout for one engine request, in seconds
    #[serde(default = "default_engine_timeout")]
    pub engine_timeout_secs: u64,

    /// CPU sampling window, in seconds
    #[serde(default = "default_cpu_sample")]
    pub cpu_sample_secs: u64,

    /// Number of points kept for the CPU chart
    #[serde(default = "default_history_len")]
    pub history_len: usize,

    /// Host name used in structured logs
    #[serde(default = "default_host_name")]
    pub host_name: String,
}

fn default_listen_port() -> u16 {
    8080
}

fn default_scan_interval() -> u64 {
    DEFAULT_SCAN_INTERVAL.as_secs()
}

fn default_clean_cutoff() -> u64 {
    DEFAULT_RETENTION.as_secs()
}

fn default_page_title() -> String {
    "server status".to_string()
}

fn default_group_label() -> String {
    DEFAULT_GROUP_LABEL.to_string()
}

fn default_docker_host() -> String {
    std::env::var("DOCKER_HOST").unwrap_or_else(|_| DEFAULT_DOCKER_HOST.to_string())
}

fn default_engine_timeout() -> u64 {
    10
}

fn default_cpu_sample() -> u64 {
    5
}

fn default_history_len() -> usize {
    DEFAULT_HISTORY_LEN
}

fn default_host_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            scan_interval_secs: default_scan_interval(),
            clean_cutoff_secs: default_clean_cutoff(),
            page_title: default_page_title(),
            group_label: default_group_label(),
            show_credit: false,
            resume_path: None,
            docker_host: default_docker_host(),
            engine_timeout_secs: default_engine_timeout(),
            cpu_sample_secs: default_cpu_sample(),
            history_len: default_history_len(),
            host_name: default_host_name(),
        }
    }
}

impl StatusConfig {
    /// Load from the optional config file and `STATUS_*` environment variables
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            builder = builder.add_source(config::File::with_name(&path));
        }
        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        let config: StatusConfig = config
            .try_deserialize()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values once, before anything is started
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.scan_interval_secs > 0, "scan_interval_secs must be positive");
        anyhow::ensure!(self.clean_cutoff_secs > 0, "clean_cutoff_secs must be positive");
        anyhow::ensure!(self.cpu_sample_secs > 0, "cpu_sample_secs must be positive");
        anyhow::ensure!(self.engine_timeout_secs > 0, "engine_timeout_secs must be positive");
        anyhow::ensure!(
            !self.group_label.trim().is_empty(),
            "group_label must not be empty"
        );
        Ok(())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn clean_cutoff(&self) -> Duration {
        Duration::from_secs(self.clean_cutoff_secs)
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs)
    }

    pub fn cpu_sample_window(&self) -> Duration {
        Duration::from_secs(self.cpu_sample_secs)
    }

    /// Bytes of the resume snapshot; a missing file reads as empty
    pub fn read_resume(&self) -> Result<Vec<u8>> {
        let Some(path) = &self.resume_path else {
            return Ok(Vec::new());
        };
        match std::fs::read(path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read resume file {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StatusConfig::default();
        assert_eq!(config.clean_cutoff(), Duration::from_secs(3 * 24 * 60 * 60));
        assert_eq!(config.page_title, "server status");
        assert_eq!(config.group_label, "com.docker.compose.project");
        assert!(!config.show_credit);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = StatusConfig {
            scan_interval_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_blank_group_label() {
        let config = StatusConfig {
            group_label: "  ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_file() {
        let config: StatusConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "page_title = \"lab\"\nshow_credit = true\nclean_cutoff_secs = 60\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.page_title, "lab");
        assert!(config.show_credit);
        assert_eq!(config.clean_cutoff(), Duration::from_secs(60));
        assert_eq!(config.listen_port, 8080);
    }

    #[test]
    fn test_read_resume_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = StatusConfig {
            resume_path: Some(dir.path().join("absent.json")),
            ..Default::default()
        };
        assert!(config.read_resume().unwrap().is_empty());

        let config = StatusConfig::default();
        assert!(config.read_resume().unwrap().is_empty());
    }

    #[test]
    fn test_read_resume_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume.json");
        std::fs::write(&path, b"{}").unwrap();
        let config = StatusConfig {
            resume_path: Some(path),
            ..Default::default()
        };
        assert_eq!(config.read_resume().unwrap(), b"{}");
    }
}
