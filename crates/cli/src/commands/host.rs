//! Host stats and server health

use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{
    color_percent, color_status, format_age, format_bytes, format_duration, print_json,
    print_table, print_warning, OutputFormat,
};

/// Row for the health table
#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Failures")]
    failures: u32,
    #[tabled(rename = "Message")]
    message: String,
}

/// Show the latest host stats
pub async fn show_stats(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let report = client.stats().await?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            let Some(updated_at) = report.updated_at else {
                print_warning("No host metrics collected yet");
                return Ok(());
            };
            let stats = report.stats;

            println!("{}", "Host Stats".bold());
            println!("{}", "=".repeat(40));
            println!("CPU:          {}", color_percent(stats.cpu_percent));
            match stats.cpu_temp {
                Some(temp) => println!("Temperature:  {:.1}°C", temp),
                None => println!("Temperature:  -"),
            }
            println!(
                "Memory:       {} / {}",
                format_bytes(stats.mem_used),
                format_bytes(stats.mem_total)
            );
            println!(
                "Load:         {:.2} {:.2} {:.2}",
                stats.load1, stats.load5, stats.load15
            );
            println!("Uptime:       {}", format_duration(stats.uptime_secs));
            println!(
                "Updated:      {}",
                format_age(updated_at, Utc::now()).dimmed()
            );
            println!("History:      {} points", report.history.len());
        }
    }

    Ok(())
}

/// Show component health as reported by `/healthz`
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health = client.health().await?;

    match format {
        OutputFormat::Json => print_json(&health)?,
        OutputFormat::Table => {
            println!("Overall: {}\n", color_status(&health.status).bold());

            let mut rows: Vec<ComponentRow> = health
                .components
                .into_iter()
                .map(|(name, c)| ComponentRow {
                    name,
                    status: color_status(&c.status),
                    failures: c.consecutive_failures,
                    message: c.message.unwrap_or_else(|| "-".to_string()),
                })
                .collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name));

            print_table(rows);
        }
    }

    Ok(())
}
