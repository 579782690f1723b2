//! Host metrics source backed by sysinfo

use super::MetricsSource;
use crate::error::ScanError;
use crate::models::HostReading;
use async_trait::async_trait;
use std::time::Duration;
use sysinfo::{Components, System, MINIMUM_CPU_UPDATE_INTERVAL};
use tracing::debug;

/// Number of CPU usage samples averaged over the sampling window
const CPU_SAMPLES: u32 = 5;

/// Samples load, memory, uptime, CPU usage and CPU temperature
pub struct SysinfoSource {
    sample_window: Duration,
}

impl SysinfoSource {
    /// `sample_window` is the time spent measuring CPU usage on each read
    pub fn new(sample_window: Duration) -> Self {
        Self { sample_window }
    }

    fn sample_interval(&self) -> Duration {
        (self.sample_window / CPU_SAMPLES).max(MINIMUM_CPU_UPDATE_INTERVAL)
    }

    /// Mean global CPU usage over the sampling window
    async fn sample_cpu(&self, sys: &mut System) -> Vec<f64> {
        sys.refresh_cpu_usage();
        if sys.cpus().is_empty() {
            return Vec::new();
        }

        let interval = self.sample_interval();
        let mut total = 0.0;
        for _ in 0..CPU_SAMPLES {
            tokio::time::sleep(interval).await;
            sys.refresh_cpu_usage();
            total += f64::from(sys.global_cpu_info().cpu_usage());
        }
        vec![total / f64::from(CPU_SAMPLES)]
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl MetricsSource for SysinfoSource {
    async fn read_host(&self) -> Result<HostReading, ScanError> {
        let mut sys = System::new();
        sys.refresh_memory();

        let mem_total = sys.total_memory();
        if mem_total == 0 {
            return Err(ScanError::unavailable(
                "host metrics",
                "memory information not available",
            ));
        }

        let load = System::load_average();
        let cpu_percent = self.sample_cpu(&mut sys).await;
        let cpu_temp = cpu_temperature(&Components::new_with_refreshed_list());

        debug!(
            cpu_samples = cpu_percent.len(),
            has_temperature = cpu_temp.is_some(),
            "Sampled host metrics"
        );

        Ok(HostReading {
            load: [load.one, load.five, load.fifteen],
            mem_used: sys.used_memory(),
            mem_total,
            cpu_percent,
            uptime_secs: System::uptime(),
            cpu_temp,
        })
    }
}

/// Hottest CPU-ish sensor, if the platform exposes any
fn cpu_temperature(components: &Components) -> Option<f64> {
    components
        .list()
        .iter()
        .filter(|c| is_cpu_sensor(c.label()))
        .map(|c| f64::from(c.temperature()))
        .filter(|t| t.is_finite() && *t > 0.0)
        .fold(None, |hottest: Option<f64>, t| {
            Some(hottest.map_or(t, |h| h.max(t)))
        })
}

fn is_cpu_sensor(label: &str) -> bool {
    let label = label.to_lowercase();
    ["cpu", "core", "package", "k10temp", "coretemp"]
        .iter()
        .any(|needle| label.contains(needle))
}
