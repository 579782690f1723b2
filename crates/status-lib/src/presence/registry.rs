//! Registry of tracked workloads and the merge/expire algorithm

use super::identity::{host_from_rule, workload_identity, TRAEFIK_RULE_LABEL};
use crate::error::ScanError;
use crate::models::{RawObservation, TrackedWorkload};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Compose project label used to group workloads
pub const DEFAULT_GROUP_LABEL: &str = "com.docker.compose.project";

/// Unseen workloads are forgotten after three days
pub const DEFAULT_RETENTION: std::time::Duration = std::time::Duration::from_secs(3 * 24 * 60 * 60);

/// What changed during a merge, for logging and metrics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeReport {
    /// Identities observed in this merge
    pub observed: usize,
    /// Observations without the group label
    pub skipped: usize,
    /// Identities seen for the first time (or again after being forgotten)
    pub appeared: Vec<String>,
    /// Identities that were down and are up again
    pub recovered: Vec<String>,
    /// Identities that were up and went missing in this merge
    pub went_down: Vec<String>,
    /// Identities removed because they passed the retention cutoff
    pub expired: Vec<String>,
}

/// In-memory map of tracked workloads keyed by identity
#[derive(Debug, Clone)]
pub struct PresenceRegistry {
    workloads: HashMap<String, TrackedWorkload>,
    group_label: String,
    retention: Duration,
}

impl PresenceRegistry {
    pub fn new(group_label: impl Into<String>, retention: std::time::Duration) -> Self {
        Self {
            workloads: HashMap::new(),
            group_label: group_label.into(),
            // an out-of-range retention means nothing ever expires
            retention: Duration::from_std(retention).unwrap_or(Duration::MAX),
        }
    }

    /// Merge one scan's observations into the registry.
    ///
    /// Either every observation is applied or, on a malformed observation,
    /// none is: the whole batch is validated before the registry is touched.
    pub fn merge(
        &mut self,
        observations: &[RawObservation],
        now: DateTime<Utc>,
    ) -> Result<MergeReport, ScanError> {
        let mut report = MergeReport::default();
        let mut seen: HashMap<String, TrackedWorkload> = HashMap::new();

        for raw in observations {
            let Some(project) = raw.labels.get(&self.group_label) else {
                report.skipped += 1;
                continue;
            };
            let Some(name) = raw.names.first() else {
                return Err(ScanError::MalformedObservation { id: raw.id.clone() });
            };

            let workload = TrackedWorkload {
                name: name.clone(),
                status: raw.status.to_lowercase(),
                link: raw
                    .labels
                    .get(TRAEFIK_RULE_LABEL)
                    .map(|rule| host_from_rule(rule))
                    .unwrap_or_default(),
                last_seen: now,
                is_down: false,
                project: project.clone(),
            };
            seen.insert(workload_identity(project, name), workload);
        }

        report.observed = seen.len();
        for (id, workload) in seen.iter() {
            match self.workloads.get(id) {
                None => report.appeared.push(id.clone()),
                Some(previous) if previous.is_down => report.recovered.push(id.clone()),
                Some(_) => {}
            }
            // a snapshot restored from the future must not move last_seen backwards
            let mut workload = workload.clone();
            if let Some(previous) = self.workloads.get(id) {
                workload.last_seen = workload.last_seen.max(previous.last_seen);
            }
            self.workloads.insert(id.clone(), workload);
        }

        let cutoff = now.checked_sub_signed(self.retention);
        let mut expired = Vec::new();
        for (id, workload) in self.workloads.iter_mut() {
            if seen.contains_key(id) {
                continue;
            }
            if cutoff.is_some_and(|cutoff| workload.last_seen < cutoff) {
                expired.push(id.clone());
                continue;
            }
            if !workload.is_down {
                workload.is_down = true;
                report.went_down.push(id.clone());
            }
        }
        for id in &expired {
            self.workloads.remove(id);
        }
        report.expired = expired;

        report.appeared.sort();
        report.recovered.sort();
        report.went_down.sort();
        report.expired.sort();

        debug!(
            observed = report.observed,
            skipped = report.skipped,
            tracked = self.workloads.len(),
            "Merged workload observations"
        );

        Ok(report)
    }

    /// All tracked workloads grouped by project, each group sorted by name
    pub fn grouped_by_project(&self) -> BTreeMap<String, Vec<TrackedWorkload>> {
        let mut groups: BTreeMap<String, Vec<TrackedWorkload>> = BTreeMap::new();
        for workload in self.workloads.values() {
            groups
                .entry(workload.project.clone())
                .or_default()
                .push(workload.clone());
        }
        for members in groups.values_mut() {
            members.sort_by(|a, b| a.name.cmp(&b.name));
        }
        groups
    }

    /// Replace the registry contents with a restored snapshot.
    ///
    /// Entries are re-keyed by their derived identity so the map invariant
    /// holds even if the snapshot keys were edited by hand. Names written with
    /// the engine's leading `/` are normalized to match what scans observe.
    pub fn seed(&mut self, snapshot: HashMap<String, TrackedWorkload>) {
        let mut workloads: HashMap<String, TrackedWorkload> = HashMap::new();
        for mut workload in snapshot.into_values() {
            workload.name = workload.name.trim_start_matches('/').to_string();
            let id = workload.identity();
            // two spellings of one workload keep the most recent record
            match workloads.get(&id) {
                Some(existing) if existing.last_seen >= workload.last_seen => {}
                _ => {
                    workloads.insert(id, workload);
                }
            }
        }
        self.workloads = workloads;
    }

    /// Restore from serialized snapshot bytes; empty input is a no-op
    pub fn seed_from_slice(&mut self, bytes: &[u8]) -> Result<usize, ScanError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(0);
        }
        let snapshot: HashMap<String, TrackedWorkload> = serde_json::from_slice(bytes)?;
        self.seed(snapshot);
        Ok(self.workloads.len())
    }

    /// Snapshot in the persisted layout (identity -> record), ordered by identity
    pub fn export(&self) -> BTreeMap<String, TrackedWorkload> {
        self.workloads
            .iter()
            .map(|(id, workload)| (id.clone(), workload.clone()))
            .collect()
    }

    pub fn get(&self, identity: &str) -> Option<&TrackedWorkload> {
        self.workloads.get(identity)
    }

    pub fn len(&self) -> usize {
        self.workloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty()
    }

    /// Number of tracked workloads currently marked down
    pub fn down_count(&self) -> usize {
        self.workloads.values().filter(|w| w.is_down).count()
    }

    pub fn group_label(&self) -> &str {
        &self.group_label
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_GROUP_LABEL, DEFAULT_RETENTION)
    }
}
