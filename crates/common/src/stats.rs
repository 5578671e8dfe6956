//! Lightweight named statistics for mixers and the composer.
//!
//! Each component owns one [`StatsReport`] and records into it from its own
//! task, so no synchronization is needed. Consumers get an owned
//! [`StatsSnapshot`] through the component's message channel.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::time::RationalTime;

/// Aggregate of every value recorded under one key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatSummary {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub last: f64,
}

impl StatSummary {
    fn record(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Point-in-time copy of a report, keyed by stat name.
pub type StatsSnapshot = BTreeMap<String, StatSummary>;

/// Named counters, samples, and clock-based timers.
#[derive(Debug, Clone, Default)]
pub struct StatsReport {
    entries: StatsSnapshot,
    timers: HashMap<String, RationalTime>,
}

impl StatsReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one value under `key`.
    pub fn record(&mut self, key: &str, value: f64) {
        self.entries.entry(key.to_string()).or_default().record(value);
    }

    /// Record a count of one under `key`.
    pub fn increment(&mut self, key: &str) {
        self.record(key, 1.0);
    }

    /// Start timing `key` at clock time `now`.
    pub fn start_timer(&mut self, key: &str, now: RationalTime) {
        self.timers.insert(key.to_string(), now);
    }

    /// Stop timing `key`, recording the elapsed seconds.
    ///
    /// Returns `None` if the timer was never started.
    pub fn end_timer(&mut self, key: &str, now: RationalTime) -> Option<f64> {
        let started = self.timers.remove(key)?;
        let elapsed = (now - started).seconds();
        self.record(key, elapsed);
        Some(elapsed)
    }

    pub fn get(&self, key: &str) -> Option<&StatSummary> {
        self.entries.get(key)
    }

    /// Number of values recorded under `key` (zero if never recorded).
    pub fn count(&self, key: &str) -> u64 {
        self.entries.get(key).map(|s| s.count).unwrap_or(0)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.entries.clone()
    }
}
