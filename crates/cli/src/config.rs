//! Configuration management for the CLI

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::output::OutputFormat;

/// CLI configuration, read from `~/.config/statusctl/config.json`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// API endpoint URL
    pub api_url: Option<String>,
    /// Default output format ("table" or "json")
    pub default_format: Option<String>,
}

impl Config {
    /// Load configuration from the default location; a missing file yields defaults
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).context("Failed to read config file")?;

        serde_json::from_str(&content).context("Failed to parse config file")
    }

    /// Configured default format, if it names a known one
    pub fn format(&self) -> Option<OutputFormat> {
        match self.default_format.as_deref()?.to_ascii_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }

    fn config_path() -> Option<PathBuf> {
        let home = dirs_next::home_dir()?;
        Some(home.join(".config").join("statusctl").join("config.json"))
    }
}
