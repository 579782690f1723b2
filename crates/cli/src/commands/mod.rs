//! Subcommand implementations

pub mod export;
pub mod host;
pub mod workloads;
