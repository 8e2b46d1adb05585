//! Cached function wrapper
//!
//! Binds a key builder, a data type and a producer to an orchestrator, so a
//! call site reads like a plain async function call:
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use tiercache::cache::{Cached, CacheKey, CacheOrchestrator, DataType};
//! # async fn fetch_price(symbol: String) -> anyhow::Result<f64> { Ok(1.0) }
//! # async fn demo() -> tiercache::Result<()> {
//! let cache = Arc::new(CacheOrchestrator::in_memory());
//! let price = Cached::new(
//!     cache,
//!     DataType::Ticker,
//!     |symbol: &String| CacheKey::new(DataType::Ticker, symbol).into_string(),
//!     fetch_price,
//! );
//!
//! let btc: f64 = price.call("BTCUSDT".to_string()).await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::orchestrator::CacheOrchestrator;
use super::policy::DataType;
use crate::error::Result;

/// A producer wrapped with multi-tier caching
pub struct Cached<K, P> {
    cache: Arc<CacheOrchestrator>,
    data_type: DataType,
    key_builder: K,
    producer: P,
}

impl<K, P> Cached<K, P> {
    /// Wrap `producer`, caching its results under keys from `key_builder`
    pub fn new(cache: Arc<CacheOrchestrator>, data_type: DataType, key_builder: K, producer: P) -> Self {
        Self {
            cache,
            data_type,
            key_builder,
            producer,
        }
    }

    /// Data type used for TTL selection
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Cached value for `args`, running the producer on a miss
    pub async fn call<A, T, Fut>(&self, args: A) -> Result<T>
    where
        K: Fn(&A) -> String,
        P: Fn(A) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let key = (self.key_builder)(&args);
        self.cache
            .get_or_compute(&key, || (self.producer)(args), self.data_type)
            .await
    }

    /// Drop the cached value for `args` from every tier
    pub async fn invalidate<A>(&self, args: &A) -> bool
    where
        K: Fn(&A) -> String,
    {
        let key = (self.key_builder)(args);
        self.cache.delete(&key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheKey;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_wrapper_caches_per_key() {
        let cache = Arc::new(CacheOrchestrator::in_memory());
        let calls = Arc::new(AtomicUsize::new(0));

        let producer_calls = Arc::clone(&calls);
        let score = Cached::new(
            Arc::clone(&cache),
            DataType::Analysis,
            |symbol: &String| CacheKey::new(DataType::Analysis, symbol).into_string(),
            move |symbol: String| {
                let calls = Arc::clone(&producer_calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(symbol.len() as u32)
                }
            },
        );

        assert_eq!(score.call("SOL".to_string()).await.unwrap(), 3);
        assert_eq!(score.call("SOL".to_string()).await.unwrap(), 3);
        assert_eq!(score.call("DOGE".to_string()).await.unwrap(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(score.invalidate(&"SOL".to_string()).await);
        assert_eq!(score.call("SOL".to_string()).await.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
