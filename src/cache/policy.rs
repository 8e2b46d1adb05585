//! Cache TTL, Promotion and Capacity Policies
//!
//! Configurable policies for placing data in the Fast and Bulk tiers.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Data types with their own TTL policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Ticker,
    Orderbook,
    MarketData,
    Dashboard,
    Confluence,
    Signals,
    Analysis,
    Default,
}

/// Unknown data-type names already reported
static UNKNOWN_DATA_TYPES: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

impl DataType {
    /// All data types, default last
    pub const ALL: [DataType; 8] = [
        DataType::Ticker,
        DataType::Orderbook,
        DataType::MarketData,
        DataType::Dashboard,
        DataType::Confluence,
        DataType::Signals,
        DataType::Analysis,
        DataType::Default,
    ];

    /// Key prefix / wire name
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Ticker => "ticker",
            DataType::Orderbook => "orderbook",
            DataType::MarketData => "market_data",
            DataType::Dashboard => "dashboard",
            DataType::Confluence => "confluence",
            DataType::Signals => "signals",
            DataType::Analysis => "analysis",
            DataType::Default => "default",
        }
    }

    /// Parse a data-type name, falling back to [`DataType::Default`].
    ///
    /// Each distinct unknown name is logged once.
    pub fn from_name(name: &str) -> Self {
        let lowered = name.trim().to_lowercase();
        for data_type in Self::ALL {
            if data_type.name() == lowered {
                return data_type;
            }
        }

        if UNKNOWN_DATA_TYPES.lock().insert(lowered.clone()) {
            tracing::warn!(data_type = %lowered, "Unknown data type, using default TTL policy");
        }
        DataType::Default
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// TTL pair for one data type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPair {
    /// Fast tier TTL
    pub fast: Duration,
    /// Bulk tier TTL
    pub bulk: Duration,
}

impl TtlPair {
    /// Create from seconds
    pub const fn from_secs(fast: u64, bulk: u64) -> Self {
        Self {
            fast: Duration::from_secs(fast),
            bulk: Duration::from_secs(bulk),
        }
    }
}

/// Per-data-type TTL table
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    entries: HashMap<DataType, TtlPair>,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl TtlPolicy {
    /// Reference TTL table
    pub fn standard() -> Self {
        let entries = HashMap::from([
            (DataType::Ticker, TtlPair::from_secs(5, 30)),
            (DataType::Orderbook, TtlPair::from_secs(2, 10)),
            (DataType::MarketData, TtlPair::from_secs(30, 300)),
            (DataType::Dashboard, TtlPair::from_secs(30, 300)),
            (DataType::Confluence, TtlPair::from_secs(30, 300)),
            (DataType::Signals, TtlPair::from_secs(60, 600)),
            (DataType::Analysis, TtlPair::from_secs(300, 1800)),
            (DataType::Default, TtlPair::from_secs(300, 3600)),
        ]);
        Self { entries }
    }

    /// Override the TTL pair of one data type
    pub fn with(mut self, data_type: DataType, pair: TtlPair) -> Self {
        self.entries.insert(data_type, pair);
        self
    }

    /// TTL pair for a data type (default pair when not configured)
    pub fn ttl(&self, data_type: DataType) -> TtlPair {
        self.entries
            .get(&data_type)
            .or_else(|| self.entries.get(&DataType::Default))
            .copied()
            .unwrap_or(TtlPair::from_secs(300, 3600))
    }

    /// Fast tier TTL for a data type
    pub fn fast_ttl(&self, data_type: DataType) -> Duration {
        self.ttl(data_type).fast
    }

    /// Bulk tier TTL for a data type
    pub fn bulk_ttl(&self, data_type: DataType) -> Duration {
        self.ttl(data_type).bulk
    }

    /// Validate the table: a default entry exists, TTLs are non-zero and the
    /// Bulk TTL never undercuts the Fast TTL.
    pub fn validate(&self) -> Result<()> {
        if !self.entries.contains_key(&DataType::Default) {
            return Err(Error::Config("TTL policy has no default entry".into()));
        }

        for (data_type, pair) in &self.entries {
            if pair.fast.is_zero() || pair.bulk.is_zero() {
                return Err(Error::Config(format!(
                    "TTL for data type '{}' must be non-zero",
                    data_type
                )));
            }
            if pair.bulk < pair.fast {
                return Err(Error::Config(format!(
                    "Bulk TTL ({:?}) for data type '{}' is shorter than its Fast TTL ({:?})",
                    pair.bulk, data_type, pair.fast
                )));
            }
        }

        Ok(())
    }
}

/// Promotion policy configuration
#[derive(Debug, Clone)]
pub struct PromotionPolicy {
    /// Access count at which a Bulk hit is copied into the Fast tier
    pub promotion_threshold: u64,
    /// Access count at which a key is written straight to the Fast tier
    pub hot_access_threshold: u64,
    /// Key prefixes that always go to the Fast tier on `set`
    pub hot_prefixes: Vec<String>,
}

impl Default for PromotionPolicy {
    fn default() -> Self {
        Self::balanced()
    }
}

impl PromotionPolicy {
    /// Balanced promotion policy (default)
    pub fn balanced() -> Self {
        Self {
            promotion_threshold: super::DEFAULT_PROMOTION_THRESHOLD,
            hot_access_threshold: super::DEFAULT_PROMOTION_THRESHOLD,
            hot_prefixes: vec![
                "ticker:".to_string(),
                "orderbook:".to_string(),
                "market_data:".to_string(),
            ],
        }
    }

    /// Aggressive promotion policy
    ///
    /// Promotes on the first Bulk hit.
    pub fn aggressive() -> Self {
        Self {
            promotion_threshold: 1,
            hot_access_threshold: 1,
            ..Self::balanced()
        }
    }

    /// Conservative promotion policy
    ///
    /// Only promotes keys with high access counts.
    pub fn conservative() -> Self {
        Self {
            promotion_threshold: 10,
            hot_access_threshold: 10,
            ..Self::balanced()
        }
    }

    /// Check if a Bulk hit should be promoted
    pub fn should_promote(&self, access_count: u64) -> bool {
        access_count >= self.promotion_threshold
    }

    /// Check if a key matches the hot-prefix allow-list
    pub fn is_hot_prefix(&self, key: &str) -> bool {
        self.hot_prefixes.iter().any(|prefix| key.starts_with(prefix))
    }

    /// Check if a key is hot (prefix or observed frequency)
    pub fn is_hot(&self, key: &str, access_count: u64) -> bool {
        self.is_hot_prefix(key) || access_count >= self.hot_access_threshold
    }

    /// Validate thresholds
    pub fn validate(&self) -> Result<()> {
        if self.promotion_threshold == 0 || self.hot_access_threshold == 0 {
            return Err(Error::Config(
                "Promotion thresholds must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Fast tier capacity policy
#[derive(Debug, Clone)]
pub struct CapacityPolicy {
    /// Key ceiling for the Fast tier
    pub max_fast_keys: usize,
    /// Maximum keys evicted in one `manage_capacity` pass
    pub eviction_batch_size: usize,
}

impl Default for CapacityPolicy {
    fn default() -> Self {
        Self {
            max_fast_keys: super::DEFAULT_MAX_FAST_KEYS,
            eviction_batch_size: 1000,
        }
    }
}

impl CapacityPolicy {
    /// Utilization of the Fast tier (0.0 - 1.0+)
    pub fn utilization(&self, fast_keys: usize) -> f64 {
        if self.max_fast_keys == 0 {
            return 0.0;
        }
        fast_keys as f64 / self.max_fast_keys as f64
    }

    /// Number of keys over the ceiling
    pub fn excess(&self, fast_keys: usize) -> usize {
        fast_keys.saturating_sub(self.max_fast_keys)
    }

    /// Validate limits
    pub fn validate(&self) -> Result<()> {
        if self.max_fast_keys == 0 {
            return Err(Error::Config("Fast tier key ceiling must be positive".into()));
        }
        if self.eviction_batch_size == 0 {
            return Err(Error::Config("Eviction batch size must be positive".into()));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
