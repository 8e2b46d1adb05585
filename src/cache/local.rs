//! Local Fallback Store
//!
//! In-process map with expiry, consulted only after both remote tiers have
//! missed or failed. Bounded: when full, expired entries are purged first and
//! then the entry closest to expiry is dropped.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;

use super::entry::{KeyPattern, StoredEntry};

/// Default entry bound for the fallback map
pub const DEFAULT_LOCAL_CAPACITY: usize = 10_000;

/// In-process fallback store
pub struct LocalFallback {
    entries: Mutex<HashMap<String, StoredEntry>>,
    capacity: usize,
}

impl Default for LocalFallback {
    fn default() -> Self {
        Self::new(DEFAULT_LOCAL_CAPACITY)
    }
}

impl LocalFallback {
    /// Create a store holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Get a live value
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => Some(entry.data().clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert a value expiring after `ttl`; returns whether it was stored
    pub fn set(&self, key: &str, value: Bytes, ttl: Duration) -> bool {
        if ttl.is_zero() {
            return false;
        }
        let mut entries = self.entries.lock();

        if entries.len() >= self.capacity && !entries.contains_key(key) {
            entries.retain(|_, entry| !entry.is_expired());

            if entries.len() >= self.capacity {
                let victim = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.expires_at())
                    .map(|(k, _)| k.clone());
                if let Some(victim) = victim {
                    tracing::debug!(key = %victim, "Local fallback full, dropping entry");
                    entries.remove(&victim);
                }
            }
        }

        entries.insert(key.to_string(), StoredEntry::new(value, ttl));
        true
    }

    /// Remove a key; returns whether a live entry was removed
    pub fn delete(&self, key: &str) -> bool {
        self.entries
            .lock()
            .remove(key)
            .map(|entry| !entry.is_expired())
            .unwrap_or(false)
    }

    /// Remove all live keys matching `pattern`, returning them
    pub fn remove_matching(&self, pattern: &KeyPattern) -> Vec<String> {
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| !entry.is_expired());

        let matched: Vec<String> = entries
            .keys()
            .filter(|key| pattern.matches(key))
            .cloned()
            .collect();
        for key in &matched {
            entries.remove(key);
        }
        matched
    }

    /// Number of stored entries, expired ones included until purged
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entry bound
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }

    /// Remove everything
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_delete() {
        let local = LocalFallback::new(10);
        assert!(local.set("ticker:btcusdt", Bytes::from_static(b"42"), Duration::from_secs(30)));

        assert_eq!(local.get("ticker:btcusdt"), Some(Bytes::from_static(b"42")));
        assert!(local.delete("ticker:btcusdt"));
        assert!(local.get("ticker:btcusdt").is_none());
        assert!(!local.delete("ticker:btcusdt"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry() {
        let local = LocalFallback::new(10);
        local.set("orderbook:ethusdt", Bytes::from_static(b"{}"), Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(local.get("orderbook:ethusdt").is_none());
        assert!(local.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_drops_soonest_expiring() {
        let local = LocalFallback::new(2);
        local.set("a", Bytes::from_static(b"1"), Duration::from_secs(100));
        local.set("b", Bytes::from_static(b"2"), Duration::from_secs(5));
        local.set("c", Bytes::from_static(b"3"), Duration::from_secs(100));

        assert_eq!(local.len(), 2);
        assert!(local.get("b").is_none());
        assert!(local.get("a").is_some());
        assert!(local.get("c").is_some());
    }

    #[test]
    fn test_zero_ttl_is_not_stored() {
        let local = LocalFallback::new(10);
        assert!(!local.set("ticker:btcusdt", Bytes::from_static(b"42"), Duration::ZERO));
        assert!(local.is_empty());
    }

    #[test]
    fn test_remove_matching() {
        let local = LocalFallback::default();
        let ttl = Duration::from_secs(60);
        local.set("dashboard:overview", Bytes::from_static(b"1"), ttl);
        local.set("dashboard:signals", Bytes::from_static(b"2"), ttl);
        local.set("market:overview", Bytes::from_static(b"3"), ttl);

        let pattern = KeyPattern::new("dashboard:*").unwrap();
        let mut removed = local.remove_matching(&pattern);
        removed.sort();

        assert_eq!(removed, vec!["dashboard:overview", "dashboard:signals"]);
        assert_eq!(local.len(), 1);
    }
}
