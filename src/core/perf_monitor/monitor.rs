//! Wiring of one collector, its dispatch receiver and one alert manager.

use parking_lot::Mutex;

use crate::error::{DbPulseError, Result};

use super::alerts::AlertManager;
use super::collector::{MetricsCollector, TickReport};
use super::dispatch::ReadingReceiver;
use super::metrics::{Alert, Reading};

/// What a single `pump()` moved through the pipeline
#[derive(Debug, Clone, Default)]
pub struct PumpReport {
    pub readings: Vec<Reading>,
    pub new_alerts: Vec<Alert>,
}

/// Drives alert evaluation from the collector's dispatch channel.
///
/// The collector runs on its own thread; `pump()` runs on the caller's and
/// moves whatever has been published since the last call through the alert
/// manager.
pub struct PerformanceMonitor {
    collector: MetricsCollector,
    alerts: AlertManager,
    receiver: Mutex<ReadingReceiver>,
}

impl PerformanceMonitor {
    /// Fails if the collector's receiver was already taken
    pub fn new(collector: MetricsCollector, alerts: AlertManager) -> Result<Self> {
        let receiver = collector
            .take_receiver()
            .ok_or_else(|| DbPulseError::collector("dispatch receiver already taken"))?;

        Ok(Self {
            collector,
            alerts,
            receiver: Mutex::new(receiver),
        })
    }

    pub fn collector(&self) -> &MetricsCollector {
        &self.collector
    }

    pub fn alerts(&self) -> &AlertManager {
        &self.alerts
    }

    pub fn start(&self) -> Result<()> {
        self.collector.start()
    }

    pub fn stop(&self) -> bool {
        self.collector.stop()
    }

    /// Drain the dispatch channel and evaluate every reading, in order
    pub fn pump(&self) -> PumpReport {
        let readings = self.receiver.lock().drain();
        let new_alerts = self.alerts.check(&readings);
        PumpReport {
            readings,
            new_alerts,
        }
    }

    /// Collect immediately on this thread, then pump
    pub fn refresh(&self) -> (TickReport, PumpReport) {
        let tick = self.collector.collect_now();
        (tick, self.pump())
    }
}
