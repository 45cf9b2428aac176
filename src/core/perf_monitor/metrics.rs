use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DbPulseError;

/// Free-form key/value payload attached to readings and alerts.
pub type Metadata = Map<String, Value>;

/// The measured quantity a reading belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    CpuPercent,
    MemoryPercent,
    IoPercent,
    DtuPercent,
    StoragePercent,
    ActiveConnections,
    BlockedProcesses,
    WaitTime,
    QueryDuration,
}

impl MetricKind {
    pub const ALL: [MetricKind; 9] = [
        MetricKind::CpuPercent,
        MetricKind::MemoryPercent,
        MetricKind::IoPercent,
        MetricKind::DtuPercent,
        MetricKind::StoragePercent,
        MetricKind::ActiveConnections,
        MetricKind::BlockedProcesses,
        MetricKind::WaitTime,
        MetricKind::QueryDuration,
    ];

    /// Short upper-case code, used as the prefix of alert ids
    pub fn code(&self) -> &'static str {
        match self {
            MetricKind::CpuPercent => "CPU",
            MetricKind::MemoryPercent => "MEMORY",
            MetricKind::IoPercent => "IO",
            MetricKind::DtuPercent => "DTU",
            MetricKind::StoragePercent => "STORAGE",
            MetricKind::ActiveConnections => "CONNECTIONS",
            MetricKind::BlockedProcesses => "BLOCKED_PROCESSES",
            MetricKind::WaitTime => "WAIT_TIME",
            MetricKind::QueryDuration => "QUERY_DURATION",
        }
    }

    /// snake_case name, identical to the serde representation
    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::CpuPercent => "cpu_percent",
            MetricKind::MemoryPercent => "memory_percent",
            MetricKind::IoPercent => "io_percent",
            MetricKind::DtuPercent => "dtu_percent",
            MetricKind::StoragePercent => "storage_percent",
            MetricKind::ActiveConnections => "active_connections",
            MetricKind::BlockedProcesses => "blocked_processes",
            MetricKind::WaitTime => "wait_time",
            MetricKind::QueryDuration => "query_duration",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::CpuPercent => "CPU Percent",
            MetricKind::MemoryPercent => "Memory Percent",
            MetricKind::IoPercent => "IO Percent",
            MetricKind::DtuPercent => "DTU Percent",
            MetricKind::StoragePercent => "Storage Percent",
            MetricKind::ActiveConnections => "Active Connections",
            MetricKind::BlockedProcesses => "Blocked Processes",
            MetricKind::WaitTime => "Wait Time",
            MetricKind::QueryDuration => "Query Duration",
        }
    }

    pub fn default_unit(&self) -> &'static str {
        match self {
            MetricKind::CpuPercent
            | MetricKind::MemoryPercent
            | MetricKind::IoPercent
            | MetricKind::DtuPercent
            | MetricKind::StoragePercent => "%",
            MetricKind::ActiveConnections => "connections",
            MetricKind::BlockedProcesses => "processes",
            MetricKind::WaitTime | MetricKind::QueryDuration => "ms",
        }
    }

    fn alias(&self) -> &'static str {
        match self {
            MetricKind::CpuPercent => "cpu",
            MetricKind::MemoryPercent => "memory",
            MetricKind::IoPercent => "io",
            MetricKind::DtuPercent => "dtu",
            MetricKind::StoragePercent => "storage",
            MetricKind::ActiveConnections => "connections",
            MetricKind::BlockedProcesses => "blocked",
            MetricKind::WaitTime => "waits",
            MetricKind::QueryDuration => "query",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MetricKind {
    type Err = DbPulseError;

    /// Accepts the code (`CPU`), the snake_case name (`cpu_percent`) or the
    /// short alias (`cpu`), ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        MetricKind::ALL
            .iter()
            .copied()
            .find(|kind| {
                needle.eq_ignore_ascii_case(kind.code())
                    || needle.eq_ignore_ascii_case(kind.name())
                    || needle.eq_ignore_ascii_case(kind.alias())
            })
            .ok_or_else(|| DbPulseError::UnknownMetricKind(needle.to_string()))
    }
}

/// One timestamped sample for a metric kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub kind: MetricKind,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub unit: String,
    pub source: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Reading {
    /// Create a reading with the kind's default unit and an empty metadata map
    pub fn new(kind: MetricKind, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            value,
            timestamp,
            unit: kind.default_unit().to_string(),
            source: String::new(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_unit<S: Into<String>>(mut self, unit: S) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_source<S: Into<String>>(mut self, source: S) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_metadata<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
    /// Reserved for failures raised by the calling layer; never produced by
    /// threshold classification.
    Error,
}

impl Severity {
    /// Classify how far a value overshoots its threshold (`value / threshold`)
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= 1.5 {
            Severity::Critical
        } else if ratio >= 1.2 {
            Severity::Warning
        } else {
            Severity::Info
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A threshold breach raised by the alert manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub kind: MetricKind,
    pub current_value: f64,
    pub threshold: f64,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
    #[serde(default)]
    pub metadata: Metadata,
}
