// dbpulse Library - Public API

// Re-export error types
pub mod error;
pub use error::{DbPulseError, Result};

// Module declarations
pub mod commands;
pub mod core;
pub mod ui;

// Re-export commonly used types
pub use crate::core::config::Config;
pub use crate::core::perf_monitor::{
    AlertManager, CollectorConfig, MetricKind, MetricSource, MetricsCollector, PerformanceMonitor,
    Reading, Severity,
};

// Initialize logging
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
