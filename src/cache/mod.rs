//! Multi-Tier Cache
//!
//! Two remote tiers fronted by an in-process fallback, with per-data-type
//! TTLs and frequency-based promotion from the Bulk tier to the Fast tier.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                        Cache Orchestrator                                │
//! ├──────────────────────────────────────────────────────────────────────────┤
//! │  Fast Tier (remote)    │ Bulk Tier (remote)   │ Local Fallback          │
//! │  ┌────────────────┐    │ ┌────────────────┐   │ ┌──────────────────┐    │
//! │  │ TierClient     │    │ │ TierClient     │   │ │ HashMap + expiry │    │
//! │  │ TTL 2s - 300s  │    │ │ TTL 10s - 1h   │   │ │ outage only      │    │
//! │  │ 10K key ceiling│    │ │                │   │ │                  │    │
//! │  └────────────────┘    │ └────────────────┘   │ └──────────────────┘    │
//! │         ▲              │         │            │                         │
//! │         └──── promotion (access count ≥ 2) ───┘                         │
//! │                                                                          │
//! │   Single-flight compute · LRU capacity index · Metrics recorder          │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Failure Model
//!
//! - Tier faults degrade to the next tier and are counted, never returned
//! - Producer errors, producer timeouts and cancellation are returned
//! - Worst case is a local, TTL-bounded cache with a reduced hit rate

mod access;
mod codec;
mod entry;
mod finite;
mod local;
mod lru;
mod memory;
mod metrics;
mod orchestrator;
mod policy;
mod singleflight;
mod tier;
mod wrap;

#[cfg(feature = "redis")]
mod redis;

pub use access::AccessTracker;
pub use codec::{CodecConfig, CodecFormat, CompressionAlgorithm, ValueCodec};
pub use entry::{key_prefix, CacheKey, KeyPattern, StoredEntry};
pub use local::LocalFallback;
pub use lru::FastTierIndex;
pub use memory::{InMemoryTier, TierCallStats};
pub use metrics::{CacheMetrics, LatencyTracker, PerformanceRating, PerformanceSnapshot};
pub use orchestrator::{CacheConfig, CacheOrchestrator, CacheResult};
pub use policy::{CapacityPolicy, DataType, PromotionPolicy, TtlPair, TtlPolicy};
pub use singleflight::{FlightRole, SingleFlight};
pub use tier::{TierClient, TierKind};
pub use wrap::Cached;

#[cfg(feature = "redis")]
pub use self::redis::{RedisTier, RedisTierConfig};

/// Bulk-tier hits after which a key is promoted
pub const DEFAULT_PROMOTION_THRESHOLD: u64 = 2;

/// Default Fast tier key ceiling
pub const DEFAULT_MAX_FAST_KEYS: usize = 10_000;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_policies() {
        assert_eq!(
            PromotionPolicy::default().promotion_threshold,
            DEFAULT_PROMOTION_THRESHOLD
        );
        assert_eq!(CapacityPolicy::default().max_fast_keys, DEFAULT_MAX_FAST_KEYS);
    }

    #[test]
    fn test_default_ttl_pair() {
        let pair = TtlPolicy::standard().ttl(DataType::Default);
        assert_eq!(pair, TtlPair::from_secs(300, 3600));
    }
}
