use chrono::{DateTime, Local, Utc};
use colored::{ColoredString, Colorize};
use serde::Serialize;

use crate::error::Result;

use crate::core::perf_monitor::{Alert, MetricKind, Reading, Severity, Thresholds};

/// One JSON object per line, for `--json` output
pub fn json_line<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Format a timestamp in local time (HH:MM:SS)
pub fn format_clock(timestamp: DateTime<Utc>) -> String {
    timestamp.with_timezone(&Local).format("%H:%M:%S").to_string()
}

/// Percentages keep one decimal, counts and durations none
pub fn format_value(value: f64, unit: &str) -> String {
    if unit == "%" {
        format!("{:.1}%", value)
    } else {
        format!("{:.0} {}", value, unit)
    }
}

pub fn severity_badge(severity: Severity) -> ColoredString {
    let text = format!("{:<8}", severity.as_str().to_uppercase());
    match severity {
        Severity::Info => text.blue(),
        Severity::Warning => text.yellow().bold(),
        Severity::Critical => text.red().bold(),
        Severity::Error => text.bright_red().bold().reversed(),
    }
}

/// One line per alert: time, severity, title, value vs threshold
pub fn format_alert(alert: &Alert) -> String {
    format!(
        "{} {} {} ({} > {}) {}",
        format_clock(alert.timestamp).dimmed(),
        severity_badge(alert.severity),
        alert.title.bold(),
        format_value(alert.current_value, alert.kind.default_unit()),
        format_value(alert.threshold, alert.kind.default_unit()),
        alert.id.dimmed()
    )
}

/// Status colour for a reading relative to its threshold, if any
fn status_for(reading: &Reading, threshold: Option<f64>) -> ColoredString {
    match threshold {
        Some(limit) if reading.value > limit => "BREACH".red().bold(),
        Some(limit) if reading.value > limit * 0.75 => "HIGH".yellow(),
        Some(_) => "OK".green(),
        None => "-".dimmed(),
    }
}

pub fn format_reading(reading: &Reading, threshold: Option<f64>) -> String {
    format!(
        "  {:<20} {:>14}  {}",
        reading.kind.label(),
        format_value(reading.value, &reading.unit),
        status_for(reading, threshold)
    )
}

pub fn print_thresholds(thresholds: &Thresholds) {
    println!("\n{}", "ALERT THRESHOLDS".bold().bright_cyan());
    println!("{}", "=".repeat(48));
    for kind in MetricKind::ALL {
        let value = match thresholds.get(kind) {
            Some(limit) => format_value(limit, kind.default_unit()).normal(),
            None => "not set".dimmed(),
        };
        println!("  {:<20} {:<14} {}", kind.label(), kind.code().dimmed(), value);
    }
    println!();
}
