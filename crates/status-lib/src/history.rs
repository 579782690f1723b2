//! Bounded history of host CPU and temperature readings
//!
//! Feeds the dashboard chart. Oldest points are evicted first once the
//! configured capacity is reached.

use crate::models::Stats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of points kept (ten minutes at a 5s scan interval)
pub const DEFAULT_HISTORY_LEN: usize = 120;

/// One sampled point of the chart
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub at: DateTime<Utc>,
    pub cpu_percent: f64,
    pub cpu_temp: Option<f64>,
}

/// Ring buffer of recent host readings
#[derive(Debug, Clone)]
pub struct History {
    points: VecDeque<HistoryPoint>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    /// Record the stats of a successful metrics refresh
    pub fn record(&mut self, stats: &Stats, at: DateTime<Utc>) {
        self.push(HistoryPoint {
            at,
            cpu_percent: stats.cpu_percent,
            cpu_temp: stats.cpu_temp,
        });
    }

    pub fn push(&mut self, point: HistoryPoint) {
        if self.capacity == 0 {
            return;
        }
        while self.points.len() >= self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    /// Points from oldest to newest
    pub fn to_vec(&self) -> Vec<HistoryPoint> {
        self.points.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}
