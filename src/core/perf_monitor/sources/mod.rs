//! Metric source adapters.
//!
//! A source is a named closure called once per tick with the tick's
//! timestamp. Sources run sequentially in the order they were registered.

mod database;
mod synthetic;

pub use database::{database_sources, QueryExecutor, Row};
pub use synthetic::{Scenario, SyntheticWorkload};

use std::fmt;

use chrono::{DateTime, Utc};

use super::metrics::Reading;
use crate::error::Result;

type CollectFn = dyn FnMut(DateTime<Utc>) -> Result<Vec<Reading>> + Send;

/// One adapter in the collector's fixed, ordered source list.
///
/// Contract: return promptly, return an empty vec when there is nothing to
/// report, and only fail with recoverable errors.
pub struct MetricSource {
    name: String,
    collect: Box<CollectFn>,
}

impl MetricSource {
    pub fn new<S, F>(name: S, collect: F) -> Self
    where
        S: Into<String>,
        F: FnMut(DateTime<Utc>) -> Result<Vec<Reading>> + Send + 'static,
    {
        Self {
            name: name.into(),
            collect: Box::new(collect),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collect(&mut self, timestamp: DateTime<Utc>) -> Result<Vec<Reading>> {
        (self.collect)(timestamp)
    }
}

impl fmt::Debug for MetricSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricSource")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
