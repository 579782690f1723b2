//! statusctl - command-line client for the compose-status dashboard
//!
//! Lists tracked workloads, shows host stats and server health, and
//! exports the registry snapshot for backup or resume.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{export, host, workloads};

const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Command-line client for the compose-status dashboard
#[derive(Parser)]
#[command(name = "statusctl")]
#[command(author, version, about = "Query a compose-status server", long_about = None)]
pub struct Cli {
    /// Server URL [default: http://localhost:8080]
    #[arg(long, env = "STATUSCTL_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List tracked workloads
    Workloads {
        /// Only show workloads of this group
        #[arg(long, short)]
        group: Option<String>,

        /// Only show workloads that are down
        #[arg(long)]
        down_only: bool,
    },

    /// Show host stats
    Stats,

    /// Export the registry snapshot (resume file layout)
    Export {
        /// Output file path (stdout if omitted)
        #[arg(long, short)]
        output: Option<String>,
    },

    /// Show server health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let file_config = config::Config::load()?;

    // Flags and environment win over the config file
    let api_url = cli
        .api_url
        .or(file_config.api_url.clone())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let format = cli.format.or(file_config.format()).unwrap_or_default();

    let client = client::ApiClient::new(&api_url)?;

    match cli.command {
        Commands::Workloads { group, down_only } => {
            workloads::list_workloads(&client, group, down_only, format).await?;
        }
        Commands::Stats => {
            host::show_stats(&client, format).await?;
        }
        Commands::Export { output } => {
            export::export_snapshot(&client, output).await?;
        }
        Commands::Health => {
            host::show_health(&client, format).await?;
        }
    }

    Ok(())
}
