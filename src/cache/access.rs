//! Per-key access counters used for promotion and hot-key decisions.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

/// Concurrent key → hit count map
#[derive(Debug, Default)]
pub struct AccessTracker {
    counts: DashMap<String, AtomicU64>,
}

impl AccessTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the counter for `key`, returning the new count
    pub fn track(&self, key: &str) -> u64 {
        if let Some(count) = self.counts.get(key) {
            return count.fetch_add(1, Ordering::Relaxed) + 1;
        }
        self.counts
            .entry(key.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed)
            + 1
    }

    /// Current count (0 for unknown keys)
    pub fn count(&self, key: &str) -> u64 {
        self.counts
            .get(key)
            .map(|count| count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Reset a key's counter
    pub fn forget(&self, key: &str) {
        self.counts.remove(key);
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Drop all counters
    pub fn clear(&self) {
        self.counts.clear();
    }
}
