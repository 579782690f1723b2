//! Output formatting utilities

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print rows as a rounded table
pub fn print_table<T: Tabled>(rows: Vec<T>) {
    if rows.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    println!("{}", Table::new(rows).with(Style::rounded()));
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2}Gi", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2}Mi", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2}Ki", bytes as f64 / KB as f64)
    } else {
        format!("{}B", bytes)
    }
}

/// Format seconds as the two most significant units, e.g. `3d 4h`
pub fn format_duration(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

/// Time elapsed since `then`, e.g. `5m 0s ago`
pub fn format_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds().max(0) as u64;
    format!("{} ago", format_duration(secs))
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "up" => status.green().to_string(),
        "degraded" => status.yellow().to_string(),
        "unhealthy" | "down" => status.red().to_string(),
        _ => status.to_string(),
    }
}

/// Color a CPU percentage by load
pub fn color_percent(percent: f64) -> String {
    let formatted = format!("{:.2}%", percent);
    if percent >= 90.0 {
        formatted.red().to_string()
    } else if percent >= 60.0 {
        formatted.yellow().to_string()
    } else {
        formatted.green().to_string()
    }
}
