use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};

use crate::error::Result;

use super::dispatch::{self, ReadingReceiver, ReadingSender};
use super::history::{MetricsHistory, DEFAULT_HISTORY_SIZE};
use super::metrics::{MetricKind, Reading};
use super::sources::MetricSource;

pub const DEFAULT_COLLECTOR_LOG_TARGET: &str = "dbpulse::collector";

const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration for metrics collection
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Pause between two ticks
    pub interval: Duration,
    /// Readings retained per metric kind
    pub history_capacity: usize,
    /// How long `stop()` waits for the loop to finish its current tick
    pub stop_timeout: Duration,
    /// `log` target used for every record emitted by the collector
    pub log_target: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            history_capacity: DEFAULT_HISTORY_SIZE,
            stop_timeout: Duration::from_secs(1),
            log_target: DEFAULT_COLLECTOR_LOG_TARGET.to_string(),
        }
    }
}

/// Outcome of a single tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub timestamp: DateTime<Utc>,
    pub readings: usize,
    pub sources: usize,
    pub failed_sources: usize,
}

impl TickReport {
    /// True when there was at least one source and none of them succeeded
    pub fn all_failed(&self) -> bool {
        self.sources > 0 && self.failed_sources == self.sources
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// Loop phase plus the condvar used for interruptible sleeps and for
/// `stop()` waiting on the worker.
struct LoopControl {
    phase: Mutex<Phase>,
    signal: Condvar,
}

impl LoopControl {
    /// Checked at every tick boundary. Marks the loop stopped and returns
    /// false once a stop was requested.
    fn keep_running(&self) -> bool {
        let mut phase = self.phase.lock();
        if *phase == Phase::Running {
            return true;
        }
        *phase = Phase::Stopped;
        self.signal.notify_all();
        false
    }

    /// Sleep for `timeout`, waking early if a stop is requested
    fn pause(&self, timeout: Duration) {
        let mut phase = self.phase.lock();
        if *phase == Phase::Running {
            self.signal
                .wait_while_for(&mut phase, |phase| *phase == Phase::Running, timeout);
        }
    }

    fn request_stop(&self) {
        let mut phase = self.phase.lock();
        if *phase == Phase::Running {
            *phase = Phase::Stopping;
            self.signal.notify_all();
        }
    }
}

/// State shared between the collector handle and its worker thread
struct Shared {
    sources: Mutex<Vec<MetricSource>>,
    history: Mutex<MetricsHistory>,
    sender: ReadingSender,
    /// Set once the receiver leaves the collector; readings are not
    /// queued before that.
    consumer_attached: AtomicBool,
    control: LoopControl,
    log_target: String,
}

impl Shared {
    /// Holds the source lock for the whole tick so concurrent ticks
    /// (worker and `collect_now`) record and publish in timestamp order.
    fn run_tick(&self) -> TickReport {
        let target = self.log_target.as_str();
        let mut batch: Vec<Reading> = Vec::new();
        let mut failed_sources = 0;

        let mut sources = self.sources.lock();
        let timestamp = Utc::now();
        let source_count = sources.len();
        for source in sources.iter_mut() {
            match panic::catch_unwind(AssertUnwindSafe(|| source.collect(timestamp))) {
                Ok(Ok(readings)) => {
                    log::trace!(target: target, "{}: {} readings", source.name(), readings.len());
                    batch.extend(readings);
                }
                Ok(Err(e)) => {
                    failed_sources += 1;
                    log::error!(target: target, "Error collecting {} metrics: {}", source.name(), e);
                }
                Err(_) => {
                    failed_sources += 1;
                    log::error!(target: target, "Metric source {} panicked", source.name());
                }
            }
        }

        let report = TickReport {
            timestamp,
            readings: batch.len(),
            sources: source_count,
            failed_sources,
        };

        if !batch.is_empty() {
            let mut history = self.history.lock();
            for reading in &batch {
                history.record(reading.clone());
            }
        }

        if !self.consumer_attached.load(Ordering::Acquire) {
            if !batch.is_empty() {
                log::trace!(
                    target: target,
                    "{} readings not published: no consumer attached",
                    batch.len()
                );
            }
            return report;
        }

        let mut undelivered = 0;
        for reading in batch {
            if !self.sender.publish(reading) {
                undelivered += 1;
            }
        }
        if undelivered > 0 {
            log::debug!(target: target, "{} readings dropped: receiver closed", undelivered);
        }
        drop(sources);

        report
    }
}

/// Pause before the next tick: doubled once after a tick where every
/// source failed.
fn next_pause(report: &TickReport, interval: Duration) -> Duration {
    if report.all_failed() {
        interval.saturating_mul(2)
    } else {
        interval
    }
}

fn run_loop(shared: Arc<Shared>, interval: Duration) {
    let target = shared.log_target.clone();
    log::info!(target: target.as_str(), "Performance metrics collection started");

    while shared.control.keep_running() {
        let report = shared.run_tick();
        let pause = next_pause(&report, interval);
        if report.all_failed() {
            log::warn!(
                target: target.as_str(),
                "All {} metric sources failed, backing off for {:?}",
                report.sources,
                pause
            );
        }
        shared.control.pause(pause);
    }

    log::info!(target: target.as_str(), "Performance metrics collection stopped");
}

/// Periodically polls a fixed, ordered list of metric sources on a
/// background thread, keeps a bounded per-kind history and publishes every
/// reading to a dispatch channel.
pub struct MetricsCollector {
    config: CollectorConfig,
    shared: Arc<Shared>,
    receiver: Mutex<Option<ReadingReceiver>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MetricsCollector {
    /// Create a new MetricsCollector with default configuration
    pub fn new(sources: Vec<MetricSource>) -> Self {
        Self::with_config(sources, CollectorConfig::default())
    }

    /// Create a new MetricsCollector with custom configuration
    pub fn with_config(sources: Vec<MetricSource>, mut config: CollectorConfig) -> Self {
        // A zero interval would spin
        config.interval = config.interval.max(MIN_INTERVAL);

        let (sender, receiver) = dispatch::channel();
        let shared = Arc::new(Shared {
            sources: Mutex::new(sources),
            history: Mutex::new(MetricsHistory::with_capacity(config.history_capacity)),
            sender,
            consumer_attached: AtomicBool::new(false),
            control: LoopControl {
                phase: Mutex::new(Phase::Idle),
                signal: Condvar::new(),
            },
            log_target: config.log_target.clone(),
        });

        Self {
            config,
            shared,
            receiver: Mutex::new(Some(receiver)),
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Launch the background loop. Calling it while running is a no-op.
    pub fn start(&self) -> Result<()> {
        let mut phase = self.shared.control.phase.lock();
        match *phase {
            Phase::Running => return Ok(()),
            Phase::Stopping => {
                // The previous worker is still finishing a tick; keep it.
                *phase = Phase::Running;
                log::debug!(target: self.shared.log_target.as_str(), "Collection loop resumed");
                return Ok(());
            }
            Phase::Idle | Phase::Stopped => {}
        }

        let mut worker = self.worker.lock();
        if let Some(previous) = worker.take() {
            // Already marked itself stopped; only the exit remains
            let _ = previous.join();
        }

        let shared = Arc::clone(&self.shared);
        let interval = self.config.interval;
        *phase = Phase::Running;
        match thread::Builder::new()
            .name("dbpulse-collector".to_string())
            .spawn(move || run_loop(shared, interval))
        {
            Ok(handle) => {
                *worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                *phase = Phase::Idle;
                Err(e.into())
            }
        }
    }

    /// Ask the loop to exit after its current tick and wait up to the
    /// configured stop timeout. Returns whether the loop has ended.
    pub fn stop(&self) -> bool {
        let target = self.shared.log_target.as_str();
        let mut phase = self.shared.control.phase.lock();
        if *phase == Phase::Running {
            *phase = Phase::Stopping;
            self.shared.control.signal.notify_all();
        }
        if *phase == Phase::Stopping {
            self.shared.control.signal.wait_while_for(
                &mut phase,
                |phase| *phase == Phase::Stopping,
                self.config.stop_timeout,
            );
        }
        let stopped = matches!(*phase, Phase::Stopped | Phase::Idle);
        drop(phase);

        if stopped {
            if let Some(handle) = self.worker.lock().take() {
                if handle.join().is_err() {
                    log::error!(target: target, "Collector thread panicked");
                }
            }
        } else {
            log::warn!(
                target: target,
                "Collector did not stop within {:?}; it will exit after the current tick",
                self.config.stop_timeout
            );
        }
        stopped
    }

    pub fn is_running(&self) -> bool {
        *self.shared.control.phase.lock() == Phase::Running
    }

    /// Run one tick synchronously on the calling thread (manual refresh)
    pub fn collect_now(&self) -> TickReport {
        self.shared.run_tick()
    }

    /// Hand out the consumer end of the dispatch channel. Only the first
    /// call gets it; readings are published from then on.
    pub fn take_receiver(&self) -> Option<ReadingReceiver> {
        let receiver = self.receiver.lock().take()?;
        self.shared.consumer_attached.store(true, Ordering::Release);
        Some(receiver)
    }

    /// Most recent retained reading for a kind
    pub fn latest(&self, kind: MetricKind) -> Option<Reading> {
        self.shared.history.lock().latest(kind).cloned()
    }

    /// Retained readings of `kind` from the trailing `window`, oldest first
    pub fn history(&self, kind: MetricKind, window: chrono::Duration) -> Vec<Reading> {
        let cutoff = Utc::now()
            .checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.shared.history.lock().since(kind, cutoff)
    }

    /// Run `f` against the history store while holding its lock
    pub fn with_history<R>(&self, f: impl FnOnce(&MetricsHistory) -> R) -> R {
        f(&self.shared.history.lock())
    }

    pub fn source_names(&self) -> Vec<String> {
        self.shared
            .sources
            .lock()
            .iter()
            .map(|source| source.name().to_string())
            .collect()
    }
}

impl Drop for MetricsCollector {
    fn drop(&mut self) {
        // The worker owns its own Arc and exits after the current tick
        self.shared.control.request_stop();
    }
}
