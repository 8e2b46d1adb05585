//! In-Memory Tier
//!
//! A [`TierClient`] backed by a `DashMap`, with per-entry expiry. Used as the
//! binary's default backend and as the spy tier in tests: it counts every
//! call, remembers the TTL of the last write per key, and can be switched
//! "down" to simulate an unreachable store.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use super::entry::{KeyPattern, StoredEntry};
use super::tier::TierClient;
use crate::error::{Error, Result};

/// Call counters for an [`InMemoryTier`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierCallStats {
    /// `get` calls
    pub gets: u64,
    /// `set` calls
    pub sets: u64,
    /// `delete` calls
    pub deletes: u64,
    /// `keys_matching` calls
    pub scans: u64,
    /// `ping` calls
    pub pings: u64,
}

/// In-memory tier client
pub struct InMemoryTier {
    name: String,
    storage: DashMap<String, StoredEntry>,
    /// Keys ever written, for spying on writes that may have since expired
    written: DashMap<String, Duration>,
    available: AtomicBool,
    latency: parking_lot::RwLock<Option<Duration>>,
    gets: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    scans: AtomicU64,
    pings: AtomicU64,
}

impl InMemoryTier {
    /// Create an empty, available tier
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            storage: DashMap::new(),
            written: DashMap::new(),
            available: AtomicBool::new(true),
            latency: parking_lot::RwLock::new(None),
            gets: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            scans: AtomicU64::new(0),
            pings: AtomicU64::new(0),
        }
    }

    /// Simulate an outage (`false`) or recovery (`true`)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Whether the tier currently accepts calls
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Add an artificial delay to every call
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write() = latency;
    }

    /// Store a value directly, bypassing call counters
    pub fn seed(&self, key: &str, value: Bytes, ttl: Duration) {
        self.storage
            .insert(key.to_string(), StoredEntry::new(value, ttl));
    }

    /// Check for a live entry without counting a `get`
    pub fn contains(&self, key: &str) -> bool {
        self.storage
            .get(key)
            .map(|entry| !entry.is_expired())
            .unwrap_or(false)
    }

    /// TTL of the last `set` call for `key`
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.written.get(key).map(|ttl| *ttl)
    }

    /// Whether `set` was ever called for `key`
    pub fn was_written(&self, key: &str) -> bool {
        self.written.contains_key(key)
    }

    /// Snapshot of call counters
    pub fn call_stats(&self) -> TierCallStats {
        TierCallStats {
            gets: self.gets.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            scans: self.scans.load(Ordering::Relaxed),
            pings: self.pings.load(Ordering::Relaxed),
        }
    }

    /// Drop all entries and counters
    pub fn reset(&self) {
        self.storage.clear();
        self.written.clear();
        for counter in [&self.gets, &self.sets, &self.deletes, &self.scans, &self.pings] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    async fn enter(&self) -> Result<()> {
        let latency = *self.latency.read();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.is_available() {
            Ok(())
        } else {
            Err(Error::TierUnavailable {
                tier: self.name.clone(),
                reason: "connection refused".into(),
            })
        }
    }

    fn purge_expired(&self) {
        self.storage.retain(|_, entry| !entry.is_expired());
    }
}

#[async_trait]
impl TierClient for InMemoryTier {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        self.enter().await?;

        let expired = match self.storage.get(key) {
            Some(entry) if !entry.is_expired() => return Ok(Some(entry.data().clone())),
            Some(_) => true,
            None => false,
        };

        // Shard guard from `get` is released by now
        if expired {
            self.storage.remove_if(key, |_, entry| entry.is_expired());
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        self.sets.fetch_add(1, Ordering::Relaxed);
        self.enter().await?;

        self.written.insert(key.to_string(), ttl);
        self.storage
            .insert(key.to_string(), StoredEntry::new(value, ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        self.enter().await?;

        Ok(self
            .storage
            .remove(key)
            .map(|(_, entry)| !entry.is_expired())
            .unwrap_or(false))
    }

    async fn keys_matching(&self, pattern: &KeyPattern) -> Result<Vec<String>> {
        self.scans.fetch_add(1, Ordering::Relaxed);
        self.enter().await?;

        self.purge_expired();
        Ok(self
            .storage
            .iter()
            .filter(|entry| pattern.matches(entry.key()))
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn key_count(&self) -> Result<usize> {
        self.enter().await?;

        self.purge_expired();
        Ok(self.storage.len())
    }

    async fn ttl_remaining(&self, key: &str) -> Result<Option<Duration>> {
        self.enter().await?;

        let now = tokio::time::Instant::now();
        let remaining = self
            .storage
            .get(key)
            .map(|entry| entry.expires_at().saturating_duration_since(now))
            .unwrap_or(Duration::ZERO);
        Ok(Some(remaining))
    }

    async fn ping(&self) -> Result<()> {
        self.pings.fetch_add(1, Ordering::Relaxed);
        self.enter().await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_basic_operations() {
        let tier = InMemoryTier::new("fast");

        tier.set("ticker:btcusdt", Bytes::from_static(b"42"), Duration::from_secs(5))
            .await
            .unwrap();

        let value = tier.get("ticker:btcusdt").await.unwrap();
        assert_eq!(value, Some(Bytes::from_static(b"42")));
        assert_eq!(tier.ttl_of("ticker:btcusdt"), Some(Duration::from_secs(5)));

        assert!(tier.delete("ticker:btcusdt").await.unwrap());
        assert!(!tier.delete("ticker:btcusdt").await.unwrap());
        assert!(tier.get("ticker:btcusdt").await.unwrap().is_none());

        let stats = tier.call_stats();
        assert_eq!(stats.sets, 1);
        assert_eq!(stats.gets, 2);
        assert_eq!(stats.deletes, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let tier = InMemoryTier::new("bulk");
        tier.set("orderbook:ethusdt", Bytes::from_static(b"{}"), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(tier.key_count().await.unwrap(), 1);

        tokio::time::advance(Duration::from_secs(2)).await;

        assert!(tier.get("orderbook:ethusdt").await.unwrap().is_none());
        assert_eq!(tier.key_count().await.unwrap(), 0);
        // The write itself is still visible to the spy
        assert!(tier.was_written("orderbook:ethusdt"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_remaining_counts_down() {
        let tier = InMemoryTier::new("bulk");
        tier.set("signals:btc", Bytes::from_static(b"1"), Duration::from_secs(30))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(12)).await;
        assert_eq!(
            tier.ttl_remaining("signals:btc").await.unwrap(),
            Some(Duration::from_secs(18))
        );
        assert_eq!(
            tier.ttl_remaining("signals:missing").await.unwrap(),
            Some(Duration::ZERO)
        );

        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(
            tier.ttl_remaining("signals:btc").await.unwrap(),
            Some(Duration::ZERO)
        );
    }

    #[tokio::test]
    async fn test_unavailable_tier_errors() {
        let tier = InMemoryTier::new("fast");
        tier.set_available(false);

        let err = tier.get("ticker:btcusdt").await.unwrap_err();
        assert!(err.is_connection_error());
        assert!(tier.ping().await.is_err());

        tier.set_available(true);
        assert!(tier.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_keys_matching() {
        let tier = InMemoryTier::new("fast");
        let ttl = Duration::from_secs(30);
        for key in ["dashboard:overview", "dashboard:signals", "market:overview"] {
            tier.set(key, Bytes::from_static(b"1"), ttl).await.unwrap();
        }

        let pattern = KeyPattern::new("dashboard:*").unwrap();
        let mut keys = tier.keys_matching(&pattern).await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["dashboard:overview", "dashboard:signals"]);
    }
}
