//! Shared dashboard state
//!
//! The presence registry, the latest host stats and the stats history live
//! behind a single lock. The scan loop is the only writer; request handlers
//! read concurrently and always see either the state before a merge or the
//! fully merged state.

use crate::error::ScanError;
use crate::history::{History, HistoryPoint};
use crate::models::{RawObservation, Stats, TrackedWorkload};
use crate::presence::{MergeReport, PresenceRegistry};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug)]
struct Inner {
    registry: PresenceRegistry,
    stats: Stats,
    stats_updated_at: Option<DateTime<Utc>>,
    history: History,
}

impl Inner {
    fn stats_snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            stats: self.stats,
            updated_at: self.stats_updated_at,
            history: self.history.to_vec(),
        }
    }
}

/// Stats snapshot handed to readers
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub stats: Stats,
    pub updated_at: Option<DateTime<Utc>>,
    pub history: Vec<HistoryPoint>,
}

/// Cheaply clonable handle to the shared state
#[derive(Debug, Clone)]
pub struct StatusState {
    inner: Arc<RwLock<Inner>>,
}

impl StatusState {
    pub fn new(registry: PresenceRegistry, history: History) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                registry,
                stats: Stats::default(),
                stats_updated_at: None,
                history,
            })),
        }
    }

    /// Merge a scan's observations; on error the registry is left as it was
    pub async fn merge(
        &self,
        observations: &[RawObservation],
        now: DateTime<Utc>,
    ) -> Result<MergeReport, ScanError> {
        let mut inner = self.inner.write().await;
        inner.registry.merge(observations, now)
    }

    /// Replace the host stats and append them to the history
    pub async fn update_stats(&self, stats: Stats, now: DateTime<Utc>) {
        let mut inner = self.inner.write().await;
        inner.stats = stats;
        inner.stats_updated_at = Some(now);
        inner.history.record(&stats, now);
    }

    /// Tracked workloads grouped by project, sorted by name within a group
    pub async fn workloads_by_group(&self) -> BTreeMap<String, Vec<TrackedWorkload>> {
        self.inner.read().await.registry.grouped_by_project()
    }

    pub async fn stats(&self) -> StatsSnapshot {
        self.inner.read().await.stats_snapshot()
    }

    /// Everything a page render needs, read under one lock acquisition
    pub async fn view(&self) -> (BTreeMap<String, Vec<TrackedWorkload>>, StatsSnapshot) {
        let inner = self.inner.read().await;
        (inner.registry.grouped_by_project(), inner.stats_snapshot())
    }

    /// Registry in the persisted snapshot layout
    pub async fn export(&self) -> BTreeMap<String, TrackedWorkload> {
        self.inner.read().await.registry.export()
    }

    /// Tracked and down workload counts
    pub async fn counts(&self) -> (usize, usize) {
        let inner = self.inner.read().await;
        (inner.registry.len(), inner.registry.down_count())
    }
}
