//! Alert system for monitoring critical conditions.
//!
//! Evaluates readings against per-kind thresholds and maintains the alert
//! lifecycle. At most one unacknowledged alert exists per metric kind: a
//! breach while an alert is outstanding is ignored, and its severity stays
//! what it was when the alert was raised. A reading back at or under the
//! threshold acknowledges the outstanding alert without notifying callbacks.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{DbPulseError, Result};

use super::metrics::{Alert, MetricKind, Reading, Severity};

pub const DEFAULT_ALERTS_LOG_TARGET: &str = "dbpulse::alerts";

/// Per-kind alert thresholds. Kinds without an entry are never evaluated.
/// Deserialized maps go through the same validation as `set`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<MetricKind, f64>", into = "BTreeMap<MetricKind, f64>")]
pub struct Thresholds {
    values: BTreeMap<MetricKind, f64>,
}

impl Thresholds {
    /// No thresholds configured
    pub fn empty() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    pub fn get(&self, kind: MetricKind) -> Option<f64> {
        self.values.get(&kind).copied()
    }

    /// Thresholds must be positive and finite
    pub fn set(&mut self, kind: MetricKind, value: f64) -> Result<()> {
        if !value.is_finite() || value <= 0.0 {
            return Err(DbPulseError::InvalidThreshold { kind, value });
        }
        self.values.insert(kind, value);
        Ok(())
    }

    pub fn remove(&mut self, kind: MetricKind) -> Option<f64> {
        self.values.remove(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricKind, f64)> + '_ {
        self.values.iter().map(|(kind, value)| (*kind, *value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        let values = BTreeMap::from([
            (MetricKind::CpuPercent, 80.0),
            (MetricKind::MemoryPercent, 85.0),
            (MetricKind::IoPercent, 90.0),
            (MetricKind::DtuPercent, 80.0),
            (MetricKind::StoragePercent, 85.0),
            (MetricKind::BlockedProcesses, 5.0),
            (MetricKind::ActiveConnections, 100.0),
            (MetricKind::WaitTime, 10_000.0),
        ]);
        Self { values }
    }
}

impl TryFrom<BTreeMap<MetricKind, f64>> for Thresholds {
    type Error = DbPulseError;

    fn try_from(values: BTreeMap<MetricKind, f64>) -> Result<Self> {
        let mut thresholds = Thresholds::empty();
        for (kind, value) in values {
            thresholds.set(kind, value)?;
        }
        Ok(thresholds)
    }
}

impl From<Thresholds> for BTreeMap<MetricKind, f64> {
    fn from(thresholds: Thresholds) -> Self {
        thresholds.values
    }
}

type AlertCallback = dyn Fn(&Alert) -> anyhow::Result<()> + Send + Sync;

/// Alert log plus the indices of the alerts still in the active set.
/// Both views share the same `Alert` values, so acknowledging one is
/// visible through the other.
#[derive(Default)]
struct AlertState {
    log: Vec<Alert>,
    active: Vec<usize>,
    sequence: u64,
}

impl AlertState {
    fn find_unacknowledged(&self, kind: MetricKind) -> Option<usize> {
        self.active
            .iter()
            .copied()
            .find(|&index| self.log[index].kind == kind && !self.log[index].acknowledged)
    }

    fn next_id(&mut self, kind: MetricKind) -> String {
        self.sequence += 1;
        format!("{}_{}_{}", kind.code(), Utc::now().timestamp(), self.sequence)
    }
}

/// Stateful threshold evaluator with observer callbacks.
pub struct AlertManager {
    thresholds: Mutex<Thresholds>,
    state: Mutex<AlertState>,
    callbacks: Mutex<Vec<Arc<AlertCallback>>>,
    log_target: String,
}

impl AlertManager {
    /// Manager with the default thresholds
    pub fn new() -> Self {
        Self::with_thresholds(Thresholds::default())
    }

    pub fn with_thresholds(thresholds: Thresholds) -> Self {
        Self {
            thresholds: Mutex::new(thresholds),
            state: Mutex::new(AlertState::default()),
            callbacks: Mutex::new(Vec::new()),
            log_target: DEFAULT_ALERTS_LOG_TARGET.to_string(),
        }
    }

    /// Route this manager's log records to `target`
    pub fn with_log_target<S: Into<String>>(mut self, target: S) -> Self {
        self.log_target = target.into();
        self
    }

    pub fn set_threshold(&self, kind: MetricKind, value: f64) -> Result<()> {
        self.thresholds.lock().set(kind, value)
    }

    pub fn get_threshold(&self, kind: MetricKind) -> Option<f64> {
        self.thresholds.lock().get(kind)
    }

    pub fn remove_threshold(&self, kind: MetricKind) -> Option<f64> {
        self.thresholds.lock().remove(kind)
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds.lock().clone()
    }

    /// Severity for a `value / threshold` ratio
    pub fn classify(ratio: f64) -> Severity {
        Severity::from_ratio(ratio)
    }

    /// Register an observer called for every newly created alert
    pub fn add_callback<F>(&self, callback: F)
    where
        F: Fn(&Alert) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.callbacks.lock().push(Arc::new(callback));
    }

    /// Evaluate readings in order. Returns the alerts created by this call.
    pub fn check(&self, readings: &[Reading]) -> Vec<Alert> {
        let mut created = Vec::new();
        for reading in readings {
            if let Some(alert) = self.evaluate(reading) {
                self.notify(&alert);
                created.push(alert);
            }
        }
        created
    }

    fn evaluate(&self, reading: &Reading) -> Option<Alert> {
        let target = self.log_target.as_str();
        let threshold = self.get_threshold(reading.kind)?;

        if !reading.value.is_finite() {
            log::debug!(target: target, "Ignoring non-finite {} reading", reading.kind.name());
            return None;
        }

        let mut state = self.state.lock();

        if reading.value <= threshold {
            if let Some(index) = state.find_unacknowledged(reading.kind) {
                let alert = &mut state.log[index];
                alert.acknowledged = true;
                log::info!(
                    target: target,
                    "{} recovered ({:.1}{} <= {}{}), alert {} acknowledged",
                    reading.kind,
                    reading.value,
                    reading.unit,
                    threshold,
                    reading.unit,
                    alert.id
                );
            }
            return None;
        }

        if state.find_unacknowledged(reading.kind).is_some() {
            // Outstanding alert keeps its original severity
            return None;
        }

        let label = reading.kind.label();
        let alert = Alert {
            id: state.next_id(reading.kind),
            severity: Self::classify(reading.value / threshold),
            title: format!("High {}", label),
            message: format!(
                "{} is {:.1}{}, exceeding threshold of {}{}",
                label, reading.value, reading.unit, threshold, reading.unit
            ),
            kind: reading.kind,
            current_value: reading.value,
            threshold,
            timestamp: reading.timestamp,
            acknowledged: false,
            metadata: reading.metadata.clone(),
        };

        state.log.push(alert.clone());
        let index = state.log.len() - 1;
        state.active.push(index);

        log::warn!(target: target, "[{}] {}", alert.severity, alert.message);
        Some(alert)
    }

    /// Invoke callbacks outside the state lock so they may call back into
    /// the manager.
    fn notify(&self, alert: &Alert) {
        let target = self.log_target.as_str();
        let callbacks: Vec<Arc<AlertCallback>> = self.callbacks.lock().clone();

        for callback in callbacks {
            match panic::catch_unwind(AssertUnwindSafe(|| callback(alert))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::error!(target: target, "Error in alert callback: {:#}", e),
                Err(_) => log::error!(target: target, "Alert callback panicked on {}", alert.id),
            }
        }
    }

    /// Mark an alert acknowledged, whether or not it is still active.
    /// Returns false when no alert has this id.
    pub fn acknowledge(&self, id: &str) -> bool {
        let mut state = self.state.lock();
        match state.log.iter_mut().find(|alert| alert.id == id) {
            Some(alert) => {
                alert.acknowledged = true;
                true
            }
            None => false,
        }
    }

    /// Drop acknowledged alerts from the active set; the log keeps them
    pub fn clear_acknowledged(&self) {
        let mut state = self.state.lock();
        let AlertState { log, active, .. } = &mut *state;
        active.retain(|&index| !log[index].acknowledged);
    }

    /// Unacknowledged alerts in the active set, oldest first
    pub fn active_alerts(&self) -> Vec<Alert> {
        let state = self.state.lock();
        state
            .active
            .iter()
            .map(|&index| &state.log[index])
            .filter(|alert| !alert.acknowledged)
            .cloned()
            .collect()
    }

    /// Every alert ever raised, oldest first
    pub fn alert_history(&self) -> Vec<Alert> {
        self.state.lock().log.clone()
    }
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new()
    }
}
