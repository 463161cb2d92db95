//! Historical samples for dashboard plots.

use std::collections::VecDeque;

use speedwatch_types::{Metric, Sample};

/// Default number of samples kept: one day at one-minute intervals.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1440;

/// Bounded, append-only record of successful samples, oldest first.
///
/// Once full, recording a sample evicts the oldest one.
#[derive(Debug, Clone)]
pub struct History {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    /// Create a new empty history with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Create a new empty history holding at most `capacity` samples.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            capacity,
        }
    }

    /// Record a new sample
    pub fn record(&mut self, sample: Sample) {
        self.samples.push_back(sample);
        if self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy of all samples, oldest first.
    pub fn to_vec(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }

    /// `(timestamp_ms, value)` points for one metric, oldest first.
    pub fn series(&self, metric: Metric) -> Vec<(u64, f64)> {
        self.samples
            .iter()
            .map(|s| (s.timestamp_ms, s.value(metric)))
            .collect()
    }
}
