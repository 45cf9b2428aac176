// Core business logic module

pub mod config;
pub mod perf_monitor;

// Re-export commonly used items
pub use config::Config;
pub use perf_monitor::{
    AlertManager, MetricKind, MetricsCollector, PerformanceMonitor, Reading, Severity,
};
