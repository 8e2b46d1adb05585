//! Redis Tier
//!
//! [`TierClient`] over Redis. Connections are auto-reconnecting
//! `ConnectionManager`s held in a small round-robin pool; each slot connects
//! lazily on first use so an unreachable server only degrades the tier
//! instead of failing start-up.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use redis::aio::ConnectionManager;
use tokio::sync::OnceCell;

use super::entry::KeyPattern;
use super::tier::TierClient;
use crate::error::{Error, Result};

const SCAN_BATCH: usize = 500;

/// Redis tier configuration
#[derive(Debug, Clone)]
pub struct RedisTierConfig {
    /// Server URL
    pub url: String,
    /// Number of pooled connections
    pub pool_size: usize,
    /// Prefix prepended to every key (empty for none)
    pub key_prefix: String,
    /// Connection establishment timeout
    pub connect_timeout: Duration,
}

impl Default for RedisTierConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            pool_size: 4,
            key_prefix: String::new(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisTierConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(Error::Config("Redis pool size must be positive".into()));
        }
        if self.url.is_empty() {
            return Err(Error::Config("Redis URL must not be empty".into()));
        }
        Ok(())
    }
}

/// Redis-backed tier client
pub struct RedisTier {
    name: String,
    client: redis::Client,
    config: RedisTierConfig,
    pool: Vec<OnceCell<ConnectionManager>>,
    next: AtomicUsize,
}

impl RedisTier {
    /// Create a tier client; no connection is made until the first call
    pub fn new(name: impl Into<String>, config: RedisTierConfig) -> Result<Self> {
        config.validate()?;

        let name = name.into();
        let client = redis::Client::open(config.url.as_str()).map_err(|e| {
            Error::Config(format!("Invalid Redis URL for {} tier: {}", name, e))
        })?;

        let pool = (0..config.pool_size).map(|_| OnceCell::new()).collect();

        Ok(Self {
            name,
            client,
            config,
            pool,
            next: AtomicUsize::new(0),
        })
    }

    async fn conn(&self) -> Result<ConnectionManager> {
        let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.pool.len();

        let manager = self.pool[slot]
            .get_or_try_init(|| async {
                let connect = ConnectionManager::new(self.client.clone());
                match tokio::time::timeout(self.config.connect_timeout, connect).await {
                    Ok(Ok(manager)) => {
                        tracing::info!(tier = %self.name, slot, "Connected to Redis");
                        Ok(manager)
                    }
                    Ok(Err(e)) => Err(self.unavailable(e)),
                    Err(_) => Err(Error::TierTimeout {
                        tier: self.name.clone(),
                        operation: "connect".into(),
                        after: self.config.connect_timeout,
                    }),
                }
            })
            .await?;

        Ok(manager.clone())
    }

    fn unavailable(&self, e: redis::RedisError) -> Error {
        Error::TierUnavailable {
            tier: self.name.clone(),
            reason: e.to_string(),
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    fn strip_prefix(&self, key: String) -> String {
        match key.strip_prefix(self.config.key_prefix.as_str()) {
            Some(stripped) => stripped.to_string(),
            None => key,
        }
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn().await?;
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| self.unavailable(e))?;

            keys.extend(batch);
            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl TierClient for RedisTier {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let mut conn = self.conn().await?;
        let value: Option<Vec<u8>> = redis::cmd("GET")
            .arg(self.full_key(key))
            .query_async(&mut conn)
            .await
            .map_err(|e| self.unavailable(e))?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        let mut conn = self.conn().await?;
        // Redis rejects a zero expiry
        let ttl_ms = ttl.as_millis().max(1) as u64;
        let _: () = redis::cmd("SET")
            .arg(self.full_key(key))
            .arg(value.as_ref())
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| self.unavailable(e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        let deleted: i64 = redis::cmd("DEL")
            .arg(self.full_key(key))
            .query_async(&mut conn)
            .await
            .map_err(|e| self.unavailable(e))?;
        Ok(deleted > 0)
    }

    async fn keys_matching(&self, pattern: &KeyPattern) -> Result<Vec<String>> {
        let full_pattern = self.full_key(pattern.as_str());
        let keys = self.scan(&full_pattern).await?;
        Ok(keys.into_iter().map(|k| self.strip_prefix(k)).collect())
    }

    async fn key_count(&self) -> Result<usize> {
        if !self.config.key_prefix.is_empty() {
            let pattern = format!("{}*", self.config.key_prefix);
            return Ok(self.scan(&pattern).await?.len());
        }

        let mut conn = self.conn().await?;
        let size: u64 = redis::cmd("DBSIZE")
            .query_async(&mut conn)
            .await
            .map_err(|e| self.unavailable(e))?;
        Ok(size as usize)
    }

    async fn ttl_remaining(&self, key: &str) -> Result<Option<Duration>> {
        let mut conn = self.conn().await?;
        let pttl: i64 = redis::cmd("PTTL")
            .arg(self.full_key(key))
            .query_async(&mut conn)
            .await
            .map_err(|e| self.unavailable(e))?;

        // -2: no such key, -1: no expiry
        Ok(match pttl {
            -2 => Some(Duration::ZERO),
            ms if ms < 0 => None,
            ms => Some(Duration::from_millis(ms as u64)),
        })
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| self.unavailable(e))?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(RedisTierConfig::default().validate().is_ok());

        let config = RedisTierConfig {
            pool_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_prefixing() {
        let tier = RedisTier::new(
            "bulk",
            RedisTierConfig {
                key_prefix: "tc:".into(),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(tier.full_key("ticker:btcusdt"), "tc:ticker:btcusdt");
        assert_eq!(tier.strip_prefix("tc:ticker:btcusdt".into()), "ticker:btcusdt");
    }

    #[test]
    fn test_invalid_url_is_config_error() {
        let result = RedisTier::new(
            "fast",
            RedisTierConfig {
                url: "not-a-url".into(),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
