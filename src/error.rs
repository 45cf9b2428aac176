use std::io;
use thiserror::Error;

use crate::core::perf_monitor::MetricKind;

/// Custom error type for dbpulse
#[derive(Error, Debug)]
pub enum DbPulseError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Metric source '{source_name}' failed: {message}")]
    Source {
        source_name: String,
        message: String,
    },

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Invalid threshold {value} for {kind}: must be a positive finite number")]
    InvalidThreshold { kind: MetricKind, value: f64 },

    #[error("Unknown metric kind: {0}")]
    UnknownMetricKind(String),

    #[error("Collector error: {0}")]
    Collector(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for dbpulse
pub type Result<T> = std::result::Result<T, DbPulseError>;

impl DbPulseError {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        DbPulseError::Config(msg.into())
    }

    /// Create a source failure attributed to the named adapter
    pub fn source_failure<N: Into<String>, S: Into<String>>(source_name: N, msg: S) -> Self {
        DbPulseError::Source {
            source_name: source_name.into(),
            message: msg.into(),
        }
    }

    pub fn query<S: Into<String>>(msg: S) -> Self {
        DbPulseError::Query(msg.into())
    }

    pub fn collector<S: Into<String>>(msg: S) -> Self {
        DbPulseError::Collector(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        DbPulseError::Other(msg.into())
    }
}
