//! Monitor command handler.
//!
//! Runs the collector against the synthetic workload and reports readings
//! and alerts until interrupted or until the requested number of ticks.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;

use super::parse_threshold;
use crate::core::perf_monitor::{
    AlertManager, MetricKind, MetricsCollector, PerformanceMonitor, Scenario, SyntheticWorkload,
    Thresholds,
};
use crate::core::Config;
use crate::ui::{format_alert, format_reading, json_line};

const PUMP_INTERVAL: Duration = Duration::from_millis(250);

/// Execute the monitor command
pub fn execute(matches: &ArgMatches) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;

    if let Some(&secs) = matches.get_one::<u64>("interval") {
        config.interval_secs = secs;
    }
    for pair in matches.get_many::<String>("threshold").into_iter().flatten() {
        let (kind, value) = parse_threshold(pair)?;
        config.set_threshold(kind, value)?;
    }

    let scenario: Scenario = matches
        .get_one::<String>("scenario")
        .map(|s| s.parse::<Scenario>())
        .transpose()?
        .unwrap_or_default();
    let max_ticks = matches.get_one::<u64>("ticks").copied();
    let json_output = matches.get_flag("json");

    let collector = MetricsCollector::with_config(
        vec![SyntheticWorkload::new(scenario).into_source()],
        config.collector_config(),
    );
    let alerts = AlertManager::with_thresholds(config.thresholds.clone());
    for name in matches.get_many::<String>("ignore").into_iter().flatten() {
        let kind: MetricKind = name.parse()?;
        if alerts.remove_threshold(kind).is_none() {
            log::debug!("No threshold configured for {}", kind.name());
        }
    }
    alerts.add_callback(move |alert| {
        if json_output {
            println!("{}", json_line(alert)?);
        } else {
            println!("{}", format_alert(alert));
        }
        Ok(())
    });
    let monitor = PerformanceMonitor::new(collector, alerts)?;

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))
        .context("Failed to install Ctrl-C handler")?;

    if !json_output {
        println!(
            "{} scenario {} every {}s (Ctrl-C to stop)",
            "Monitoring".bold().bright_cyan(),
            scenario.to_string().bold(),
            config.interval_secs
        );
        println!(
            "{} {}",
            "Sources:".dimmed(),
            monitor.collector().source_names().join(", ")
        );
    }

    monitor.start().context("Failed to start metrics collection")?;
    let mut ticks_seen = BTreeSet::new();

    while running.load(Ordering::SeqCst) {
        thread::sleep(PUMP_INTERVAL);
        let report = monitor.pump();

        for reading in &report.readings {
            ticks_seen.insert(reading.timestamp);
            if json_output {
                println!("{}", json_line(reading)?);
            }
        }
        if !json_output && !report.readings.is_empty() {
            print_tick(&report.readings, &config.thresholds);
        }

        if max_ticks.is_some_and(|limit| ticks_seen.len() as u64 >= limit) {
            break;
        }
    }

    if !monitor.stop() {
        log::warn!("Collector still finishing its last tick");
    }

    if !json_output {
        print_summary(&monitor, ticks_seen.len());
    }
    Ok(())
}

fn print_tick(readings: &[crate::core::Reading], thresholds: &Thresholds) {
    println!("{}", "-".repeat(48).dimmed());
    for reading in readings {
        println!("{}", format_reading(reading, thresholds.get(reading.kind)));
    }
}

fn print_summary(monitor: &PerformanceMonitor, ticks: usize) {
    let active = monitor.alerts().active_alerts();
    let total = monitor.alerts().alert_history().len();

    println!("\n{}", "SUMMARY".bold().bright_cyan());
    println!("{}", "=".repeat(48));
    println!("  Ticks observed:  {}", ticks);
    println!("  Alerts raised:   {}", total);
    println!("  Still active:    {}", active.len());
    for alert in &active {
        println!("  {}", format_alert(alert));
    }
}
