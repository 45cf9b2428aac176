// Command handlers module
pub mod monitor;
pub mod thresholds;
pub mod version;

// Re-exports for cleaner imports
pub use monitor::execute as monitor;
pub use thresholds::execute as thresholds;
pub use version::execute as version;

use anyhow::{Context, Result};

use crate::core::perf_monitor::MetricKind;

/// Parse a `KIND=VALUE` pair such as `cpu=80` or `CONNECTIONS=150`
pub fn parse_threshold(pair: &str) -> Result<(MetricKind, f64)> {
    let (kind, value) = pair
        .split_once('=')
        .with_context(|| format!("Expected KIND=VALUE, got '{}'", pair))?;

    let kind: MetricKind = kind.parse()?;
    let value: f64 = value
        .trim()
        .parse()
        .with_context(|| format!("Invalid threshold value '{}'", value.trim()))?;

    Ok((kind, value))
}
