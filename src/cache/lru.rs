//! Fast Tier LRU Index
//!
//! Tracks recency of keys the orchestrator has written to or served from the
//! Fast tier, so capacity management evicts true least-recently-used keys.
//! Each key carries its Fast-tier expiry; expired keys are dropped before
//! counting or choosing victims.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Slot {
    tick: u64,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    slots: HashMap<String, Slot>,
    /// tick -> key, oldest first
    order: BTreeMap<u64, String>,
    clock: u64,
}

impl Inner {
    fn next_tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.slots.remove(key) {
            Some(slot) => {
                self.order.remove(&slot.tick);
                true
            }
            None => false,
        }
    }

    fn purge_expired(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .slots
            .iter()
            .filter(|(_, slot)| now >= slot.expires_at)
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            self.remove(&key);
        }
    }
}

/// LRU index over Fast-tier keys
#[derive(Debug, Default)]
pub struct FastTierIndex {
    inner: Mutex<Inner>,
}

impl FastTierIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a Fast-tier write; refreshes recency and expiry
    pub fn record_write(&self, key: &str, ttl: Duration) {
        let mut inner = self.inner.lock();
        let tick = inner.next_tick();
        let expires_at = Instant::now() + ttl;

        if let Some(old) = inner.slots.insert(key.to_string(), Slot { tick, expires_at }) {
            inner.order.remove(&old.tick);
        }
        inner.order.insert(tick, key.to_string());
    }

    /// Record a Fast-tier hit; refreshes recency only
    pub fn touch(&self, key: &str) {
        let mut inner = self.inner.lock();
        let Some(old) = inner.slots.get(key).copied() else {
            return;
        };
        let tick = inner.next_tick();

        inner.order.remove(&old.tick);
        inner.order.insert(tick, key.to_string());
        if let Some(slot) = inner.slots.get_mut(key) {
            slot.tick = tick;
        }
    }

    /// Forget a key
    pub fn remove(&self, key: &str) -> bool {
        self.inner.lock().remove(key)
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.purge_expired(Instant::now());
        inner.slots.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a live key is tracked
    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .lock()
            .slots
            .get(key)
            .map(|slot| Instant::now() < slot.expires_at)
            .unwrap_or(false)
    }

    /// Remove and return up to `count` least-recently-used keys, never taking
    /// the `keep_newest` most recent ones
    pub fn evict_oldest(&self, count: usize, keep_newest: usize) -> Vec<String> {
        let mut inner = self.inner.lock();
        inner.purge_expired(Instant::now());

        let take = inner.slots.len().saturating_sub(keep_newest).min(count);
        let mut victims = Vec::with_capacity(take);
        for _ in 0..take {
            let Some((_, key)) = inner.order.pop_first() else {
                break;
            };
            inner.slots.remove(&key);
            victims.push(key);
        }
        victims
    }

    /// Keys from least to most recently used
    pub fn keys_by_recency(&self) -> Vec<String> {
        let mut inner = self.inner.lock();
        inner.purge_expired(Instant::now());
        inner.order.values().cloned().collect()
    }
}
