use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::perf_monitor::{CollectorConfig, MetricKind, Thresholds, DEFAULT_HISTORY_SIZE};

fn default_interval_secs() -> u64 {
    5
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_SIZE
}

fn default_stop_timeout_ms() -> u64 {
    1000
}

/// Persisted settings for the monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Seconds between two collection ticks
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Readings kept per metric kind
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
    #[serde(default)]
    pub thresholds: Thresholds,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            history_capacity: default_history_capacity(),
            stop_timeout_ms: default_stop_timeout_ms(),
            thresholds: Thresholds::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    /// Missing, empty or unreadable JSON all fall back to defaults
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let data = fs::read(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Config::default());
        }

        Ok(serde_json::from_slice(&data).unwrap_or_else(|e| {
            // Happens when the config format changes between versions
            log::warn!("Ignoring corrupted config {:?}: {}", config_path, e);
            Config::default()
        }))
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let data =
            serde_json::to_vec_pretty(self).with_context(|| "Failed to serialize config")?;

        fs::write(config_path, data)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().with_context(|| "Could not determine config directory")?;

        Ok(config_dir.join("dbpulse").join("config.json"))
    }

    pub fn set_threshold(&mut self, kind: MetricKind, value: f64) -> Result<()> {
        self.thresholds
            .set(kind, value)
            .with_context(|| format!("Cannot set threshold for {}", kind.name()))
    }

    /// Restore the built-in thresholds
    pub fn reset_thresholds(&mut self) {
        self.thresholds = Thresholds::default();
    }

    /// Collector settings derived from this config
    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            interval: Duration::from_secs(self.interval_secs),
            history_capacity: self.history_capacity,
            stop_timeout: Duration::from_millis(self.stop_timeout_ms),
            ..Default::default()
        }
    }
}
