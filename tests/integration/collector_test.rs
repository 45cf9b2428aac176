// Background collection loop: lifecycle, isolation, backoff and history

use dbpulse::core::perf_monitor::{
    CollectorConfig, MetricKind, MetricSource, MetricsCollector, Reading, DEFAULT_HISTORY_SIZE,
};
use dbpulse::DbPulseError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

fn fast_config(interval_ms: u64) -> CollectorConfig {
    CollectorConfig {
        interval: Duration::from_millis(interval_ms),
        stop_timeout: Duration::from_secs(2),
        ..Default::default()
    }
}

fn constant_source(name: &str, kind: MetricKind, value: f64) -> MetricSource {
    MetricSource::new(name, move |timestamp| {
        Ok(vec![Reading::new(kind, value, timestamp)])
    })
}

fn failing_source(name: &str) -> MetricSource {
    MetricSource::new(name, |_| Err(DbPulseError::query("connection reset")))
}

#[test]
fn test_background_ticks_reach_receiver() {
    let collector = MetricsCollector::with_config(
        vec![constant_source("cpu", MetricKind::CpuPercent, 42.0)],
        fast_config(20),
    );
    let mut receiver = collector.take_receiver().unwrap();

    collector.start().unwrap();
    assert!(collector.is_running());
    thread::sleep(Duration::from_millis(150));
    assert!(collector.stop());
    assert!(!collector.is_running());

    let readings = receiver.drain();
    assert!(readings.len() >= 2, "got {} readings", readings.len());
    assert!(readings.iter().all(|r| r.kind == MetricKind::CpuPercent));
    assert_eq!(
        collector.with_history(|h| h.len(MetricKind::CpuPercent)),
        readings.len()
    );
}

#[test]
fn test_no_ticks_after_stop() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let collector = MetricsCollector::with_config(
        vec![MetricSource::new("count", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        })],
        fast_config(10),
    );

    collector.start().unwrap();
    thread::sleep(Duration::from_millis(60));
    assert!(collector.stop());

    let after_stop = calls.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(80));
    assert_eq!(calls.load(Ordering::SeqCst), after_stop);
}

#[test]
fn test_stop_interrupts_long_sleep() {
    let config = CollectorConfig {
        interval: Duration::from_secs(60),
        stop_timeout: Duration::from_secs(2),
        ..Default::default()
    };
    let collector = MetricsCollector::with_config(
        vec![constant_source("cpu", MetricKind::CpuPercent, 1.0)],
        config,
    );

    collector.start().unwrap();
    thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    assert!(collector.stop());
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_failing_adapter_does_not_block_others() {
    let collector = MetricsCollector::with_config(
        vec![
            constant_source("cpu", MetricKind::CpuPercent, 10.0),
            failing_source("sessions"),
            constant_source("storage", MetricKind::StoragePercent, 20.0),
        ],
        fast_config(20),
    );

    let report = collector.collect_now();
    assert_eq!(report.sources, 3);
    assert_eq!(report.failed_sources, 1);
    assert_eq!(report.readings, 2);
    assert!(!report.all_failed());

    assert!(collector.latest(MetricKind::CpuPercent).is_some());
    assert!(collector.latest(MetricKind::StoragePercent).is_some());
    assert!(collector.latest(MetricKind::ActiveConnections).is_none());
}

#[test]
fn test_all_sources_failing_doubles_pause() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&calls);
    let collector = MetricsCollector::with_config(
        vec![MetricSource::new("db", move |_| {
            log.lock().unwrap().push(Instant::now());
            Err(DbPulseError::query("login failed"))
        })],
        fast_config(60),
    );

    collector.start().unwrap();
    thread::sleep(Duration::from_millis(450));
    assert!(collector.stop());

    let calls = calls.lock().unwrap();
    assert!(calls.len() >= 2, "only {} ticks", calls.len());
    for pair in calls.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(115));
    }
}

#[test]
fn test_panicking_source_keeps_loop_alive() {
    let collector = MetricsCollector::with_config(
        vec![
            MetricSource::new("broken", |_| panic!("driver bug")),
            constant_source("io", MetricKind::IoPercent, 5.0),
        ],
        fast_config(15),
    );

    collector.start().unwrap();
    thread::sleep(Duration::from_millis(100));
    assert!(collector.is_running());
    assert!(collector.stop());

    assert!(collector.with_history(|h| h.len(MetricKind::IoPercent)) >= 2);
}

#[test]
fn test_history_keeps_most_recent_entries() {
    let value = Arc::new(AtomicUsize::new(0));
    let next = Arc::clone(&value);
    let collector = MetricsCollector::new(vec![MetricSource::new("seq", move |timestamp| {
        let v = next.fetch_add(1, Ordering::SeqCst) as f64;
        Ok(vec![Reading::new(MetricKind::WaitTime, v, timestamp)])
    })]);

    for _ in 0..DEFAULT_HISTORY_SIZE + 1 {
        collector.collect_now();
    }

    let values = collector.with_history(|h| h.values(MetricKind::WaitTime));
    assert_eq!(values.len(), DEFAULT_HISTORY_SIZE);
    assert_eq!(values[0], 1.0);
    assert_eq!(values[values.len() - 1], DEFAULT_HISTORY_SIZE as f64);
}

#[test]
fn test_history_window_filters_old_readings() {
    let collector = MetricsCollector::new(vec![constant_source(
        "cpu",
        MetricKind::CpuPercent,
        33.0,
    )]);
    collector.collect_now();

    assert_eq!(
        collector
            .history(MetricKind::CpuPercent, chrono::Duration::minutes(60))
            .len(),
        1
    );
    assert!(collector
        .history(MetricKind::CpuPercent, chrono::Duration::seconds(-5))
        .is_empty());
}

#[test]
fn test_restart_after_stop() {
    let collector = MetricsCollector::with_config(
        vec![constant_source("cpu", MetricKind::CpuPercent, 1.0)],
        fast_config(10),
    );
    let mut receiver = collector.take_receiver().unwrap();

    collector.start().unwrap();
    thread::sleep(Duration::from_millis(40));
    assert!(collector.stop());
    let first_run = receiver.drain().len();

    collector.start().unwrap();
    thread::sleep(Duration::from_millis(40));
    assert!(collector.stop());

    assert!(first_run > 0);
    assert!(!receiver.drain().is_empty());
}

#[test]
fn test_backoff_applies_to_a_single_pause() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&calls);
    let collector = MetricsCollector::with_config(
        vec![MetricSource::new("flaky", move |timestamp| {
            let mut calls = log.lock().unwrap();
            calls.push(Instant::now());
            if calls.len() == 1 {
                Err(DbPulseError::query("transient failure"))
            } else {
                Ok(vec![Reading::new(MetricKind::CpuPercent, 1.0, timestamp)])
            }
        })],
        fast_config(150),
    );

    collector.start().unwrap();
    thread::sleep(Duration::from_millis(800));
    assert!(collector.stop());

    let calls = calls.lock().unwrap();
    assert!(calls.len() >= 3, "only {} ticks", calls.len());
    let gaps: Vec<Duration> = calls.windows(2).map(|pair| pair[1] - pair[0]).collect();
    assert!(gaps[0] >= Duration::from_millis(295), "first gap {:?}", gaps[0]);
    assert!(gaps[1] >= Duration::from_millis(145));
    assert!(gaps[1] < Duration::from_millis(290), "second gap {:?}", gaps[1]);
}

#[test]
fn test_stop_lets_in_flight_tick_finish() {
    let (entered_tx, entered_rx) = std::sync::mpsc::channel();
    let collector = MetricsCollector::with_config(
        vec![MetricSource::new("slow", move |timestamp| {
            let _ = entered_tx.send(());
            thread::sleep(Duration::from_millis(150));
            Ok(vec![Reading::new(MetricKind::WaitTime, 900.0, timestamp)])
        })],
        fast_config(10_000),
    );
    let mut receiver = collector.take_receiver().unwrap();

    collector.start().unwrap();
    entered_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("adapter never called");
    assert!(collector.stop());

    let published = receiver.drain();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].value, 900.0);
    assert_eq!(collector.with_history(|h| h.len(MetricKind::WaitTime)), 1);
}
