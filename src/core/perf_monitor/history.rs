use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};

use super::metrics::{MetricKind, Reading};

/// 24 hours at one sample per minute
pub const DEFAULT_HISTORY_SIZE: usize = 1440;

/// Per-kind circular buffers of the most recent readings.
///
/// Capacity counts samples, not time: a collector polling every 5 seconds
/// keeps two hours of data with the default size.
#[derive(Debug, Clone)]
pub struct MetricsHistory {
    capacity: usize,
    series: HashMap<MetricKind, VecDeque<Reading>>,
}

impl MetricsHistory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_SIZE)
    }

    /// A capacity of zero is bumped to one so `latest` keeps working
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            series: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a reading to its kind's buffer, evicting the oldest when full
    pub fn record(&mut self, reading: Reading) {
        let capacity = self.capacity;
        let queue = self
            .series
            .entry(reading.kind)
            .or_insert_with(|| VecDeque::with_capacity(capacity.min(64)));
        Self::push_value(queue, reading, capacity);
    }

    fn push_value<T>(queue: &mut VecDeque<T>, value: T, capacity: usize) {
        if queue.len() >= capacity {
            queue.pop_front();
        }
        queue.push_back(value);
    }

    pub fn latest(&self, kind: MetricKind) -> Option<&Reading> {
        self.series.get(&kind).and_then(|queue| queue.back())
    }

    /// Readings of `kind` stamped at or after `cutoff`, oldest first
    pub fn since(&self, kind: MetricKind, cutoff: DateTime<Utc>) -> Vec<Reading> {
        self.series
            .get(&kind)
            .map(|queue| {
                queue
                    .iter()
                    .filter(|reading| reading.timestamp >= cutoff)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn iter(&self, kind: MetricKind) -> impl Iterator<Item = &Reading> {
        self.series.get(&kind).into_iter().flatten()
    }

    pub fn len(&self, kind: MetricKind) -> usize {
        self.series.get(&kind).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(VecDeque::is_empty)
    }

    /// Kinds that have at least one retained reading
    pub fn kinds(&self) -> Vec<MetricKind> {
        let mut kinds: Vec<_> = self
            .series
            .iter()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|(kind, _)| *kind)
            .collect();
        kinds.sort();
        kinds
    }

    /// Values of one kind as a plain series, oldest first (for sparklines)
    pub fn values(&self, kind: MetricKind) -> Vec<f64> {
        self.iter(kind).map(|reading| reading.value).collect()
    }
}

impl Default for MetricsHistory {
    fn default() -> Self {
        Self::new()
    }
}
