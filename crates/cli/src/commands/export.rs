//! Registry export

use anyhow::{Context, Result};

use crate::client::ApiClient;
use crate::output::print_success;

/// Write the server's registry snapshot, usable as a resume file
pub async fn export_snapshot(client: &ApiClient, output: Option<String>) -> Result<()> {
    let snapshot = client.snapshot().await?;
    let json = serde_json::to_string_pretty(&snapshot).context("Failed to serialize snapshot")?;

    match output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write snapshot to {}", path))?;
            print_success(&format!(
                "Exported {} workloads to {}",
                snapshot.len(),
                path
            ));
        }
        None => println!("{}", json),
    }

    Ok(())
}
