//! Presence tracking for compose workloads
//!
//! Observed containers are merged into a long-lived registry keyed by a
//! stable identity. Workloads missing from a scan are marked down, and
//! workloads unseen for longer than the retention cutoff are forgotten.

mod identity;
mod registry;


pub use identity::{host_from_rule, workload_identity, TRAEFIK_RULE_LABEL};
pub use registry::{MergeReport, PresenceRegistry, DEFAULT_GROUP_LABEL, DEFAULT_RETENTION};
