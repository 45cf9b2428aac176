//! Synthetic workload generator for demos and smoke tests.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::Rng;

use super::MetricSource;
use crate::core::perf_monitor::metrics::{MetricKind, Reading};
use crate::error::DbPulseError;

/// Load pattern the generator imitates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scenario {
    #[default]
    Normal,
    HighLoad,
    CriticalAlerts,
    /// Picks one of the other scenarios at random on every tick
    Mixed,
}

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Normal => "normal",
            Scenario::HighLoad => "high-load",
            Scenario::CriticalAlerts => "critical",
            Scenario::Mixed => "mixed",
        }
    }

    /// Value range per kind: (low, high)
    fn ranges(&self) -> [(MetricKind, f64, f64); 8] {
        match self {
            Scenario::Normal | Scenario::Mixed => [
                (MetricKind::CpuPercent, 20.0, 50.0),
                (MetricKind::MemoryPercent, 30.0, 60.0),
                (MetricKind::IoPercent, 10.0, 40.0),
                (MetricKind::DtuPercent, 15.0, 45.0),
                (MetricKind::StoragePercent, 40.0, 70.0),
                (MetricKind::ActiveConnections, 5.0, 25.0),
                (MetricKind::BlockedProcesses, 0.0, 2.0),
                (MetricKind::WaitTime, 100.0, 2000.0),
            ],
            Scenario::HighLoad => [
                (MetricKind::CpuPercent, 60.0, 85.0),
                (MetricKind::MemoryPercent, 65.0, 90.0),
                (MetricKind::IoPercent, 50.0, 80.0),
                (MetricKind::DtuPercent, 55.0, 85.0),
                (MetricKind::StoragePercent, 70.0, 85.0),
                (MetricKind::ActiveConnections, 40.0, 80.0),
                (MetricKind::BlockedProcesses, 2.0, 8.0),
                (MetricKind::WaitTime, 5000.0, 15000.0),
            ],
            Scenario::CriticalAlerts => [
                (MetricKind::CpuPercent, 85.0, 98.0),
                (MetricKind::MemoryPercent, 88.0, 95.0),
                (MetricKind::IoPercent, 85.0, 95.0),
                (MetricKind::DtuPercent, 85.0, 98.0),
                (MetricKind::StoragePercent, 88.0, 95.0),
                (MetricKind::ActiveConnections, 80.0, 120.0),
                (MetricKind::BlockedProcesses, 8.0, 20.0),
                (MetricKind::WaitTime, 15000.0, 30000.0),
            ],
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = DbPulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "normal" => Ok(Scenario::Normal),
            "high-load" | "high" => Ok(Scenario::HighLoad),
            "critical" | "critical-alerts" => Ok(Scenario::CriticalAlerts),
            "mixed" => Ok(Scenario::Mixed),
            other => Err(DbPulseError::other(format!("unknown scenario '{}'", other))),
        }
    }
}

/// Generates one reading per kind (query duration excluded) from the
/// ranges of the selected scenario.
#[derive(Debug, Clone, Default)]
pub struct SyntheticWorkload {
    scenario: Scenario,
}

impl SyntheticWorkload {
    pub fn new(scenario: Scenario) -> Self {
        Self { scenario }
    }

    pub fn scenario(&self) -> Scenario {
        self.scenario
    }

    pub fn generate(&self, timestamp: DateTime<Utc>) -> Vec<Reading> {
        let mut rng = rand::thread_rng();
        let scenario = match self.scenario {
            Scenario::Mixed => match rng.gen_range(0..3) {
                0 => Scenario::Normal,
                1 => Scenario::HighLoad,
                _ => Scenario::CriticalAlerts,
            },
            other => other,
        };

        scenario
            .ranges()
            .iter()
            .map(|&(kind, low, high)| {
                let value = match kind {
                    // Counts are whole numbers
                    MetricKind::ActiveConnections | MetricKind::BlockedProcesses => {
                        rng.gen_range(low as u64..=high as u64) as f64
                    }
                    _ => rng.gen_range(low..high),
                };
                Reading::new(kind, value, timestamp)
                    .with_source("synthetic")
                    .with_metadata("scenario", scenario.as_str())
            })
            .collect()
    }

    /// Wrap the generator as a collector source
    pub fn into_source(self) -> MetricSource {
        MetricSource::new(format!("synthetic:{}", self.scenario), move |timestamp| {
            Ok(self.generate(timestamp))
        })
    }
}
