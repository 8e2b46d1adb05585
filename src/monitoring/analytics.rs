//! Hot-key analytics
//!
//! Per-key access bookkeeping used for ranking and recommendations only. It
//! is not authoritative cache state.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Bookkeeping for one key
#[derive(Debug, Clone, PartialEq)]
pub struct KeyAnalytics {
    pub access_count: u64,
    pub hit_count: u64,
    pub miss_count: u64,
    pub total_latency: Duration,
    pub first_access: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
}

impl KeyAnalytics {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            access_count: 0,
            hit_count: 0,
            miss_count: 0,
            total_latency: Duration::ZERO,
            first_access: now,
            last_access: now,
        }
    }

    /// Hit rate in percent
    pub fn hit_rate_percent(&self) -> f64 {
        if self.access_count == 0 {
            0.0
        } else {
            self.hit_count as f64 / self.access_count as f64 * 100.0
        }
    }

    /// Mean latency in milliseconds
    pub fn avg_latency_ms(&self) -> f64 {
        if self.access_count == 0 {
            0.0
        } else {
            self.total_latency.as_secs_f64() * 1000.0 / self.access_count as f64
        }
    }
}

/// Ranked hot-key entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotKey {
    pub key: String,
    pub access_count: u64,
    pub hit_rate_percent: f64,
    pub avg_latency_ms: f64,
    pub last_access: DateTime<Utc>,
}

/// Concurrent per-key analytics with a bound on tracked keys
pub struct HotKeyTracker {
    keys: DashMap<String, KeyAnalytics>,
    max_keys: usize,
}

impl HotKeyTracker {
    /// Track at most `max_keys` keys
    pub fn new(max_keys: usize) -> Self {
        Self {
            keys: DashMap::new(),
            max_keys: max_keys.max(1),
        }
    }

    /// Record one access
    pub fn record(&self, key: &str, hit: bool, latency: Duration) {
        let now = Utc::now();

        if !self.keys.contains_key(key) && self.keys.len() >= self.max_keys {
            self.shed();
        }

        let mut entry = self
            .keys
            .entry(key.to_string())
            .or_insert_with(|| KeyAnalytics::new(now));
        entry.access_count += 1;
        if hit {
            entry.hit_count += 1;
        } else {
            entry.miss_count += 1;
        }
        entry.total_latency += latency;
        entry.last_access = now;
    }

    /// Drop the coldest tenth of tracked keys
    fn shed(&self) {
        let mut counts: Vec<(String, u64)> = self
            .keys
            .iter()
            .map(|entry| (entry.key().clone(), entry.access_count))
            .collect();
        counts.sort_by_key(|(_, count)| *count);

        let drop = (self.max_keys / 10).max(1);
        for (key, _) in counts.into_iter().take(drop) {
            self.keys.remove(&key);
        }
    }

    /// Analytics for one key
    pub fn get(&self, key: &str) -> Option<KeyAnalytics> {
        self.keys.get(key).map(|entry| entry.clone())
    }

    /// Top keys by access count
    pub fn hot_keys(&self, limit: usize) -> Vec<HotKey> {
        let mut ranked: Vec<HotKey> = self
            .keys
            .iter()
            .map(|entry| HotKey {
                key: entry.key().clone(),
                access_count: entry.access_count,
                hit_rate_percent: entry.hit_rate_percent(),
                avg_latency_ms: entry.avg_latency_ms(),
                last_access: entry.last_access,
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.access_count
                .cmp(&a.access_count)
                .then_with(|| a.key.cmp(&b.key))
        });
        ranked.truncate(limit);
        ranked
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Forget everything
    pub fn clear(&self) {
        self.keys.clear();
    }
}
