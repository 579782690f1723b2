//! Workload listing

use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, Workload, WorkloadList};
use crate::output::{color_status, format_age, print_json, print_table, OutputFormat};

/// Row for the workloads table
#[derive(Tabled)]
struct WorkloadRow {
    #[tabled(rename = "Group")]
    group: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Link")]
    link: String,
    #[tabled(rename = "Last Seen")]
    last_seen: String,
}

/// Keep only the requested group and, optionally, only down workloads
fn filter(list: WorkloadList, group: Option<&str>, down_only: bool) -> Vec<Workload> {
    list.groups
        .into_iter()
        .filter(|(name, _)| group.map_or(true, |g| g == name.as_str()))
        .flat_map(|(_, members)| members)
        .filter(|w| !down_only || w.is_down)
        .collect()
}

/// List tracked workloads
pub async fn list_workloads(
    client: &ApiClient,
    group: Option<String>,
    down_only: bool,
    format: OutputFormat,
) -> Result<()> {
    let list = client.workloads().await?;
    let (tracked, down) = (list.tracked, list.down);
    let workloads = filter(list, group.as_deref(), down_only);

    match format {
        OutputFormat::Json => print_json(&workloads)?,
        OutputFormat::Table => {
            let now = Utc::now();
            let rows: Vec<WorkloadRow> = workloads
                .iter()
                .map(|w| WorkloadRow {
                    group: w.project.clone(),
                    name: w.name.clone(),
                    state: color_status(if w.is_down { "down" } else { "up" }),
                    status: w.status.clone(),
                    link: if w.link.is_empty() {
                        "-".to_string()
                    } else {
                        w.link.clone()
                    },
                    last_seen: if w.is_down {
                        format_age(w.last_seen, now)
                    } else {
                        "now".to_string()
                    },
                })
                .collect();

            print_table(rows);
            println!(
                "\nTracked: {}  Down: {}",
                tracked.to_string().bold(),
                if down > 0 {
                    down.to_string().red().bold()
                } else {
                    down.to_string().green()
                }
            );
        }
    }

    Ok(())
}
