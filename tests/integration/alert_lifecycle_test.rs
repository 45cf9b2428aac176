// Alert lifecycle: breach, dedup, recovery, acknowledgment and purge

use chrono::Utc;
use dbpulse::core::perf_monitor::{AlertManager, MetricKind, Reading, Severity, Thresholds};
use std::sync::{Arc, Mutex};

fn reading(kind: MetricKind, value: f64) -> Reading {
    Reading::new(kind, value, Utc::now())
}

fn manager_with(thresholds: &[(MetricKind, f64)]) -> AlertManager {
    let manager = AlertManager::with_thresholds(Thresholds::empty());
    for &(kind, value) in thresholds {
        manager.set_threshold(kind, value).unwrap();
    }
    manager
}

fn record_callbacks(manager: &AlertManager) -> Arc<Mutex<Vec<String>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    manager.add_callback(move |alert| {
        sink.lock().unwrap().push(alert.id.clone());
        Ok(())
    });
    seen
}

#[test]
fn test_breach_severity_matches_ratio() {
    let cases = [
        (85.0, Severity::Info),
        (96.0, Severity::Warning),
        (119.9, Severity::Warning),
        (120.0, Severity::Critical),
        (400.0, Severity::Critical),
    ];

    for (value, expected) in cases {
        let manager = manager_with(&[(MetricKind::CpuPercent, 80.0)]);
        let created = manager.check(&[reading(MetricKind::CpuPercent, value)]);
        assert_eq!(created.len(), 1, "value {}", value);
        assert_eq!(created[0].severity, expected, "value {}", value);
        assert_eq!(created[0].severity, AlertManager::classify(value / 80.0));
    }
}

#[test]
fn test_classification_boundaries() {
    assert_eq!(AlertManager::classify(1.5), Severity::Critical);
    assert_eq!(AlertManager::classify(1.2), Severity::Warning);
    assert_eq!(AlertManager::classify(1.1999), Severity::Info);
}

#[test]
fn test_value_equal_to_threshold_is_not_a_breach() {
    let manager = manager_with(&[(MetricKind::ActiveConnections, 100.0)]);
    assert!(manager
        .check(&[reading(MetricKind::ActiveConnections, 100.0)])
        .is_empty());
    assert!(manager.alert_history().is_empty());
}

#[test]
fn test_dedup_keeps_original_severity() {
    let manager = manager_with(&[(MetricKind::CpuPercent, 80.0)]);
    let seen = record_callbacks(&manager);

    let first = manager.check(&[reading(MetricKind::CpuPercent, 95.0)]);
    assert_eq!(first[0].severity, Severity::Info);

    let second = manager.check(&[reading(MetricKind::CpuPercent, 130.0)]);
    assert!(second.is_empty());

    let active = manager.active_alerts();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].severity, Severity::Info);
    assert_eq!(active[0].current_value, 95.0);
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn test_dedup_is_per_kind() {
    let manager = AlertManager::new();
    let created = manager.check(&[
        reading(MetricKind::CpuPercent, 90.0),
        reading(MetricKind::DtuPercent, 90.0),
        reading(MetricKind::CpuPercent, 99.0),
    ]);

    let kinds: Vec<MetricKind> = created.iter().map(|a| a.kind).collect();
    assert_eq!(kinds, vec![MetricKind::CpuPercent, MetricKind::DtuPercent]);
}

#[test]
fn test_recovery_is_silent() {
    let manager = manager_with(&[(MetricKind::WaitTime, 10_000.0)]);
    let seen = record_callbacks(&manager);

    manager.check(&[reading(MetricKind::WaitTime, 25_000.0)]);
    manager.check(&[reading(MetricKind::WaitTime, 500.0)]);

    assert!(manager.active_alerts().is_empty());
    let history = manager.alert_history();
    assert_eq!(history.len(), 1);
    assert!(history[0].acknowledged);
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn test_clear_acknowledged_keeps_log() {
    let manager = AlertManager::new();
    let created = manager.check(&[
        reading(MetricKind::CpuPercent, 90.0),
        reading(MetricKind::StoragePercent, 99.0),
        reading(MetricKind::BlockedProcesses, 12.0),
    ]);
    assert_eq!(created.len(), 3);

    manager.acknowledge(&created[1].id);
    manager.check(&[reading(MetricKind::BlockedProcesses, 1.0)]);
    let log_before = manager.alert_history().len();

    manager.clear_acknowledged();

    let active = manager.active_alerts();
    assert_eq!(active.len(), 1);
    assert!(active.iter().all(|alert| !alert.acknowledged));
    assert_eq!(manager.alert_history().len(), log_before);
}

#[test]
fn test_unacknowledged_alert_per_kind_under_concurrency() {
    let manager = Arc::new(manager_with(&[(MetricKind::CpuPercent, 50.0)]));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let manager = Arc::clone(&manager);
            std::thread::spawn(move || {
                for j in 0..200 {
                    let value = if (i + j) % 3 == 0 { 10.0 } else { 75.0 };
                    manager.check(&[reading(MetricKind::CpuPercent, value)]);
                    let unacked = manager
                        .active_alerts()
                        .iter()
                        .filter(|alert| alert.kind == MetricKind::CpuPercent)
                        .count();
                    assert!(unacked <= 1);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let ids: std::collections::HashSet<String> =
        manager.alert_history().into_iter().map(|a| a.id).collect();
    assert_eq!(ids.len(), manager.alert_history().len());
}

#[test]
fn test_end_to_end_ticks() {
    let manager = manager_with(&[
        (MetricKind::CpuPercent, 80.0),
        (MetricKind::ActiveConnections, 100.0),
    ]);
    let seen = record_callbacks(&manager);

    // Tick 1
    let created = manager.check(&[
        reading(MetricKind::CpuPercent, 45.0),
        reading(MetricKind::ActiveConnections, 12.0),
    ]);
    assert!(created.is_empty());

    // Tick 2
    let created = manager.check(&[reading(MetricKind::CpuPercent, 95.0)]);
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].severity, Severity::Info);
    assert!(created[0].id.contains("CPU"));
    let first_id = created[0].id.clone();

    // Tick 3
    let created = manager.check(&[reading(MetricKind::CpuPercent, 60.0)]);
    assert!(created.is_empty());
    assert!(manager.alert_history()[0].acknowledged);
    assert_eq!(seen.lock().unwrap().len(), 1);

    // Tick 4
    let created = manager.check(&[reading(MetricKind::CpuPercent, 130.0)]);
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].severity, Severity::Critical);
    assert_ne!(created[0].id, first_id);
    assert_eq!(*seen.lock().unwrap(), vec![first_id, created[0].id.clone()]);
}
