//! Database performance monitoring core.
//!
//! A background collector polls a fixed list of metric sources, keeps a
//! bounded history per metric kind and publishes readings to a dispatch
//! channel; the alert manager turns threshold breaches into deduplicated,
//! severity-classified alerts.

pub mod alerts;
mod collector;
mod dispatch;
mod history;
mod metrics;
mod monitor;
pub mod sources;

pub use alerts::{AlertManager, Thresholds};
pub use collector::{CollectorConfig, MetricsCollector, TickReport};
pub use dispatch::{channel, ReadingReceiver, ReadingSender};
pub use history::{MetricsHistory, DEFAULT_HISTORY_SIZE};
pub use metrics::{Alert, Metadata, MetricKind, Reading, Severity};
pub use monitor::{PerformanceMonitor, PumpReport};
pub use sources::{database_sources, MetricSource, QueryExecutor, Row, Scenario, SyntheticWorkload};
