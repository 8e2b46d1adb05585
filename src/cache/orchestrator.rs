//! Cache Orchestrator - Fast / Bulk / Local
//!
//! Reads go Fast tier → Bulk tier → Local fallback and return on the first
//! hit. Writes always go to the Bulk tier, and to the Fast tier for hot keys.
//! Bulk hits that cross the promotion threshold are copied into the Fast tier
//! in the background.
//!
//! Tier faults never reach the caller: each tier call runs under its own
//! timeout and a failure is logged, counted, and treated as a miss for that
//! tier. Only producer failures, producer timeouts and cancellation are
//! returned as errors.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::instrument;

use super::access::AccessTracker;
use super::codec::{CodecConfig, ValueCodec};
use super::entry::KeyPattern;
use super::local::{LocalFallback, DEFAULT_LOCAL_CAPACITY};
use super::lru::FastTierIndex;
use super::memory::InMemoryTier;
use super::metrics::{CacheMetrics, LatencyTracker, PerformanceSnapshot};
use super::policy::{CapacityPolicy, DataType, PromotionPolicy, TtlPolicy};
use super::singleflight::{FlightRole, SingleFlight};
use super::tier::{TierClient, TierKind};
use crate::error::{Error, Result};
use crate::monitoring::{HealthReport, HealthStatus, LocalHealth, PerformanceMonitor, TierHealth};

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Per-data-type TTLs
    pub ttl_policy: TtlPolicy,
    /// Promotion and hot-key policy
    pub promotion: PromotionPolicy,
    /// Fast tier key ceiling
    pub capacity: CapacityPolicy,
    /// Value codec settings
    pub codec: CodecConfig,
    /// Timeout applied to every tier call
    pub tier_timeout: Duration,
    /// Timeout applied to producers in `get_or_compute`
    pub compute_timeout: Duration,
    /// Timeout for each health-check ping
    pub health_check_timeout: Duration,
    /// Entry bound of the local fallback
    pub local_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_policy: TtlPolicy::standard(),
            promotion: PromotionPolicy::default(),
            capacity: CapacityPolicy::default(),
            codec: CodecConfig::default(),
            tier_timeout: Duration::from_secs(5),
            compute_timeout: Duration::from_secs(30),
            health_check_timeout: Duration::from_secs(2),
            local_capacity: DEFAULT_LOCAL_CAPACITY,
        }
    }
}

impl CacheConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.ttl_policy.validate()?;
        self.promotion.validate()?;
        self.capacity.validate()?;

        for (name, timeout) in [
            ("tier", self.tier_timeout),
            ("compute", self.compute_timeout),
            ("health check", self.health_check_timeout),
        ] {
            if timeout.is_zero() {
                return Err(Error::Config(format!("{} timeout must be non-zero", name)));
            }
        }

        if self.local_capacity == 0 {
            return Err(Error::Config("Local fallback capacity must be positive".into()));
        }
        Ok(())
    }
}

/// Cache lookup result
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
    /// The cached value
    pub value: T,
    /// Which tier served it
    pub tier: TierKind,
    /// Lookup latency
    pub latency: Duration,
}

/// Whether a tier walk counts the faults it runs into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Faults {
    Count,
    /// Repeat lookups; the first walk already counted them
    Ignore,
}

/// State shared with background promotion tasks
struct Inner {
    fast: Arc<dyn TierClient>,
    bulk: Arc<dyn TierClient>,
    local: LocalFallback,
    config: CacheConfig,
    codec: ValueCodec,
    metrics: Arc<CacheMetrics>,
    access: AccessTracker,
    fast_index: FastTierIndex,
    monitor: RwLock<Option<Arc<PerformanceMonitor>>>,
}

impl Inner {
    fn client(&self, tier: TierKind) -> &dyn TierClient {
        match tier {
            TierKind::Fast => self.fast.as_ref(),
            _ => self.bulk.as_ref(),
        }
    }

    /// Run a tier call under the tier timeout
    async fn tier_call<R, Fut>(&self, tier: TierKind, operation: &'static str, call: Fut) -> Result<R>
    where
        Fut: Future<Output = Result<R>>,
    {
        match tokio::time::timeout(self.config.tier_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::TierTimeout {
                tier: tier.name().to_string(),
                operation: operation.to_string(),
                after: self.config.tier_timeout,
            }),
        }
    }

    fn note_fault(&self, tier: TierKind, operation: &str, key: &str, err: &Error) {
        tracing::debug!(
            tier = tier.name(),
            backend = self.client(tier).name(),
            operation,
            key,
            error = %err,
            "Tier call failed, falling through"
        );
        self.metrics.record_error(err.is_connection_error());
    }

    fn walk_fault(&self, faults: Faults, tier: TierKind, operation: &str, key: &str, err: &Error) {
        match faults {
            Faults::Count => self.note_fault(tier, operation, key, err),
            Faults::Ignore => {
                tracing::trace!(tier = tier.name(), operation, key, error = %err, "Repeat lookup fault")
            }
        }
    }

    /// Copy encoded bytes into the Fast tier, expiring no later than the
    /// Bulk copy they came from
    async fn promote(&self, key: &str, bytes: Bytes, fast_ttl: Duration) {
        let remaining = self
            .tier_call(TierKind::Bulk, "ttl", self.bulk.ttl_remaining(key))
            .await;
        let ttl = match remaining {
            Ok(Some(left)) if left.is_zero() => {
                tracing::debug!(key, "Bulk copy expired before promotion");
                return;
            }
            Ok(Some(left)) => fast_ttl.min(left),
            Ok(None) => fast_ttl,
            Err(e) => {
                self.note_fault(TierKind::Bulk, "ttl", key, &e);
                fast_ttl
            }
        };

        let write = self.fast.set(key, bytes, ttl);
        match self.tier_call(TierKind::Fast, "set", write).await {
            Ok(()) => {
                tracing::debug!(key, ttl_secs = ttl.as_secs(), "Promoted to fast tier");
                self.fast_index.record_write(key, ttl);
                self.manage_capacity().await;
            }
            Err(e) => self.note_fault(TierKind::Fast, "promote", key, &e),
        }
    }

    /// Bring the Fast tier back under its key ceiling
    ///
    /// The ceiling is checked against the tier's own key count, which
    /// includes keys written by other orchestrators sharing it. Victims come
    /// from this instance's LRU index first (never its newest key), then from
    /// keys the index has never seen.
    async fn manage_capacity(&self) -> usize {
        let policy = &self.config.capacity;
        let stored = match self
            .tier_call(TierKind::Fast, "count", self.fast.key_count())
            .await
        {
            Ok(count) => count,
            Err(e) => {
                self.note_fault(TierKind::Fast, "count", "*", &e);
                self.fast_index.len()
            }
        };

        let excess = policy.excess(stored).min(policy.eviction_batch_size);
        let victims = if excess > 0 {
            self.pick_victims(excess).await
        } else {
            Vec::new()
        };

        let mut evicted = 0;
        for key in &victims {
            match self
                .tier_call(TierKind::Fast, "delete", self.fast.delete(key))
                .await
            {
                Ok(_) => {
                    self.metrics.record_eviction();
                    evicted += 1;
                }
                Err(e) => self.note_fault(TierKind::Fast, "evict", key, &e),
            }
        }

        if evicted > 0 {
            tracing::debug!(evicted, ceiling = policy.max_fast_keys, "Evicted fast tier keys");
        }

        let utilization = policy.utilization(stored.saturating_sub(evicted)) * 100.0;
        if let Some(monitor) = self.monitor.read().as_ref() {
            monitor.set_fast_utilization(utilization);
        }

        evicted
    }

    async fn pick_victims(&self, count: usize) -> Vec<String> {
        let mut victims = self.fast_index.evict_oldest(count, 1);
        if victims.len() >= count {
            return victims;
        }

        let pattern = match KeyPattern::new("*") {
            Ok(pattern) => pattern,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot build fast tier scan pattern");
                return victims;
            }
        };
        match self
            .tier_call(TierKind::Fast, "scan", self.fast.keys_matching(&pattern))
            .await
        {
            Ok(mut keys) => {
                keys.retain(|key| !self.fast_index.contains(key) && !victims.contains(key));
                keys.sort();
                let shortfall = count - victims.len();
                victims.extend(keys.into_iter().take(shortfall));
            }
            Err(e) => self.note_fault(TierKind::Fast, "scan", pattern.as_str(), &e),
        }
        victims
    }

    fn observe(&self, key: &str, hit: bool, latency: Duration) {
        let monitor = self.monitor.read().clone();
        if let Some(monitor) = monitor {
            monitor.record_operation(key, hit, latency);
        }
    }
}

/// Multi-tier cache orchestrator
pub struct CacheOrchestrator {
    inner: Arc<Inner>,
    flights: SingleFlight,
    background: TaskTracker,
}

impl CacheOrchestrator {
    /// Create an orchestrator over two tier clients
    pub fn new(
        fast: Arc<dyn TierClient>,
        bulk: Arc<dyn TierClient>,
        config: CacheConfig,
    ) -> Result<Self> {
        config.validate()?;

        tracing::info!(
            fast = fast.name(),
            bulk = bulk.name(),
            max_fast_keys = config.capacity.max_fast_keys,
            "Cache orchestrator initialized"
        );

        Ok(Self::build(fast, bulk, config))
    }

    /// Create with in-memory tiers and default configuration
    pub fn in_memory() -> Self {
        Self::build(
            Arc::new(InMemoryTier::new("fast")),
            Arc::new(InMemoryTier::new("bulk")),
            CacheConfig::default(),
        )
    }

    fn build(fast: Arc<dyn TierClient>, bulk: Arc<dyn TierClient>, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                fast,
                bulk,
                local: LocalFallback::new(config.local_capacity),
                codec: ValueCodec::with_config(config.codec.clone()),
                config,
                metrics: Arc::new(CacheMetrics::new()),
                access: AccessTracker::new(),
                fast_index: FastTierIndex::new(),
                monitor: RwLock::new(None),
            }),
            flights: SingleFlight::new(),
            background: TaskTracker::new(),
        }
    }

    /// Attach a performance monitor fed by every read
    pub fn attach_monitor(&self, monitor: Arc<PerformanceMonitor>) {
        *self.inner.monitor.write() = Some(monitor);
    }

    /// Attached monitor, if any
    pub fn monitor(&self) -> Option<Arc<PerformanceMonitor>> {
        self.inner.monitor.read().clone()
    }

    /// Shared metrics recorder
    pub fn metrics_handle(&self) -> Arc<CacheMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    /// Get metrics snapshot
    pub fn metrics(&self) -> PerformanceSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Get configuration
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Access count recorded for a key
    pub fn access_count(&self, key: &str) -> u64 {
        self.inner.access.count(key)
    }

    /// Keys currently tracked in the Fast tier
    pub fn fast_tier_len(&self) -> usize {
        self.inner.fast_index.len()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Get a value, trying Fast → Bulk → Local
    pub async fn get<T: DeserializeOwned>(&self, key: &str, data_type: DataType) -> Option<T> {
        self.lookup(key, data_type).await.map(|result| result.value)
    }

    /// Like [`get`](Self::get), also reporting the serving tier and latency
    #[instrument(level = "debug", skip(self))]
    pub async fn lookup<T: DeserializeOwned>(
        &self,
        key: &str,
        data_type: DataType,
    ) -> Option<CacheResult<T>> {
        let tracker = LatencyTracker::start();
        let found = self.find(key, data_type, Faults::Count).await;

        match &found {
            Some(result) => self.inner.observe(key, true, result.latency),
            None => {
                self.inner.metrics.record_miss(None);
                self.inner.observe(key, false, tracker.elapsed());
            }
        }
        found
    }

    /// Tier walk; records hits but not misses
    async fn find<T: DeserializeOwned>(
        &self,
        key: &str,
        data_type: DataType,
        faults: Faults,
    ) -> Option<CacheResult<T>> {
        let inner = &self.inner;
        let tracker = LatencyTracker::start();

        // Fast tier
        match inner.tier_call(TierKind::Fast, "get", inner.fast.get(key)).await {
            Ok(Some(bytes)) => match inner.codec.decode::<T>(&bytes) {
                Ok(value) => {
                    let latency = tracker.elapsed();
                    inner.access.track(key);
                    inner.fast_index.touch(key);
                    inner.metrics.record_fast_hit(latency);
                    return Some(CacheResult {
                        value,
                        tier: TierKind::Fast,
                        latency,
                    });
                }
                Err(e) => inner.walk_fault(faults, TierKind::Fast, "decode", key, &e),
            },
            Ok(None) => {}
            Err(e) => inner.walk_fault(faults, TierKind::Fast, "get", key, &e),
        }

        // Bulk tier
        let bulk_tracker = LatencyTracker::start();
        match inner.tier_call(TierKind::Bulk, "get", inner.bulk.get(key)).await {
            Ok(Some(bytes)) => match inner.codec.decode::<T>(&bytes) {
                Ok(value) => {
                    let count = inner.access.track(key);
                    let promote = inner.config.promotion.should_promote(count);
                    if promote {
                        self.spawn_promotion(key, bytes, data_type);
                    }
                    inner.metrics.record_bulk_hit(bulk_tracker.elapsed(), promote);
                    return Some(CacheResult {
                        value,
                        tier: TierKind::Bulk,
                        latency: tracker.elapsed(),
                    });
                }
                Err(e) => inner.walk_fault(faults, TierKind::Bulk, "decode", key, &e),
            },
            Ok(None) => {}
            Err(e) => inner.walk_fault(faults, TierKind::Bulk, "get", key, &e),
        }

        // Local fallback
        let local_tracker = LatencyTracker::start();
        if let Some(bytes) = inner.local.get(key) {
            match inner.codec.decode::<T>(&bytes) {
                Ok(value) => {
                    inner.access.track(key);
                    inner.metrics.record_local_hit(local_tracker.elapsed());
                    return Some(CacheResult {
                        value,
                        tier: TierKind::Local,
                        latency: tracker.elapsed(),
                    });
                }
                Err(e) => {
                    tracing::debug!(key, error = %e, "Local fallback entry undecodable");
                    if faults == Faults::Count {
                        inner.metrics.record_error(false);
                    }
                }
            }
        }

        None
    }

    fn spawn_promotion(&self, key: &str, bytes: Bytes, data_type: DataType) {
        let inner = Arc::clone(&self.inner);
        let key = key.to_string();
        let ttl = inner.config.ttl_policy.fast_ttl(data_type);

        self.background.spawn(async move {
            inner.promote(&key, bytes, ttl).await;
        });
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Store a value; returns whether any tier accepted it
    ///
    /// The Bulk tier always receives the value. The Fast tier receives it as
    /// well when `force_fast` is set or the key is hot. If neither remote
    /// write succeeds the value goes to the local fallback with the Bulk TTL.
    #[instrument(level = "debug", skip(self, value))]
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        data_type: DataType,
        force_fast: bool,
    ) -> bool {
        let inner = &self.inner;

        let bytes = match inner.codec.encode(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key, error = %e, "Value could not be encoded, write abandoned");
                inner.metrics.record_error(false);
                return false;
            }
        };

        let ttl = inner.config.ttl_policy.ttl(data_type);
        let mut remote_ok = false;

        let write = inner.bulk.set(key, bytes.clone(), ttl.bulk);
        match inner.tier_call(TierKind::Bulk, "set", write).await {
            Ok(()) => remote_ok = true,
            Err(e) => inner.note_fault(TierKind::Bulk, "set", key, &e),
        }

        let hot = force_fast || inner.config.promotion.is_hot(key, inner.access.count(key));
        if hot {
            let write = inner.fast.set(key, bytes.clone(), ttl.fast);
            match inner.tier_call(TierKind::Fast, "set", write).await {
                Ok(()) => {
                    remote_ok = true;
                    inner.fast_index.record_write(key, ttl.fast);
                    inner.manage_capacity().await;
                }
                Err(e) => inner.note_fault(TierKind::Fast, "set", key, &e),
            }
        }

        if remote_ok {
            // A remote copy now supersedes anything stored during an outage
            inner.local.delete(key);
            true
        } else {
            tracing::warn!(key, "Remote tiers unavailable, storing in local fallback");
            inner.local.set(key, bytes, ttl.bulk)
        }
    }

    /// Remove a key from every tier and reset its access count
    #[instrument(level = "debug", skip(self))]
    pub async fn delete(&self, key: &str) -> bool {
        let inner = &self.inner;
        let mut deleted = false;

        for tier in [TierKind::Fast, TierKind::Bulk] {
            let client = inner.client(tier);
            match inner.tier_call(tier, "delete", client.delete(key)).await {
                Ok(existed) => deleted |= existed,
                Err(e) => inner.note_fault(tier, "delete", key, &e),
            }
        }

        deleted |= inner.local.delete(key);
        inner.access.forget(key);
        inner.fast_index.remove(key);

        deleted
    }

    /// Remove every key matching a glob (or prefix) pattern from the Fast tier,
    /// the Bulk tier and the local fallback. Returns the number of distinct
    /// keys removed.
    #[instrument(level = "debug", skip(self))]
    pub async fn clear_pattern(&self, pattern: &str) -> usize {
        let inner = &self.inner;
        let pattern = match KeyPattern::new(pattern) {
            Ok(pattern) => pattern,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring invalid clear pattern");
                return 0;
            }
        };

        let mut removed: HashSet<String> = HashSet::new();

        for tier in [TierKind::Fast, TierKind::Bulk] {
            let client = inner.client(tier);
            let keys = match inner
                .tier_call(tier, "scan", client.keys_matching(&pattern))
                .await
            {
                Ok(keys) => keys,
                Err(e) => {
                    inner.note_fault(tier, "scan", pattern.as_str(), &e);
                    continue;
                }
            };

            for key in keys {
                match inner.tier_call(tier, "delete", client.delete(&key)).await {
                    Ok(true) => {
                        removed.insert(key);
                    }
                    Ok(false) => {}
                    Err(e) => inner.note_fault(tier, "delete", &key, &e),
                }
            }
        }

        removed.extend(inner.local.remove_matching(&pattern));

        for key in &removed {
            inner.access.forget(key);
            inner.fast_index.remove(key);
        }

        tracing::info!(pattern = pattern.as_str(), count = removed.len(), "Cleared keys by pattern");
        removed.len()
    }

    // =========================================================================
    // Compute
    // =========================================================================

    /// Get a value, computing and storing it on a miss
    ///
    /// Concurrent misses for the same key share one producer invocation. The
    /// producer runs under the compute timeout; its error is returned to every
    /// waiting caller.
    #[instrument(level = "debug", skip(self, producer))]
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        key: &str,
        producer: F,
        data_type: DataType,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let tracker = LatencyTracker::start();
        let epoch = self.flights.epoch(key);

        if let Some(hit) = self.find::<T>(key, data_type, Faults::Count).await {
            self.inner.observe(key, true, hit.latency);
            return Ok(hit.value);
        }

        let (result, role) = self
            .flights
            .run(key, || self.compute(key, producer, data_type, epoch))
            .await;

        match role {
            FlightRole::Leader => {
                // Leader metrics are recorded inside `compute`
                let hit = matches!(result, Ok((_, None)));
                self.inner.observe(key, hit, tracker.elapsed());
            }
            FlightRole::Follower => {
                self.inner.metrics.record_miss(None);
                self.inner.observe(key, false, tracker.elapsed());
            }
        }

        result.map(|(value, _)| value)
    }

    /// Leader side of `get_or_compute`; the `Duration` is the compute time
    /// when the producer ran. `epoch` is the flight epoch read before the
    /// caller's own lookup.
    async fn compute<T, F, Fut>(
        &self,
        key: &str,
        producer: F,
        data_type: DataType,
        epoch: u64,
    ) -> Result<(T, Option<Duration>)>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let inner = &self.inner;

        // Another flight finished after our lookup and may have stored the value
        if self.flights.epoch(key) != epoch {
            if let Some(hit) = self.find::<T>(key, data_type, Faults::Ignore).await {
                return Ok((hit.value, None));
            }
        }

        let tracker = LatencyTracker::start();
        let timeout = inner.config.compute_timeout;
        let value = match tokio::time::timeout(timeout, producer()).await {
            Ok(Ok(value)) => value,
            Ok(Err(cause)) => {
                tracing::warn!(key, error = %cause, "Producer failed");
                inner.metrics.record_error(false);
                inner.metrics.record_miss(None);
                return Err(Error::compute(key, cause));
            }
            Err(_) => {
                tracing::warn!(key, after = ?timeout, "Producer timed out");
                inner.metrics.record_error(false);
                inner.metrics.record_miss(None);
                return Err(Error::ComputeTimeout {
                    key: key.to_string(),
                    after: timeout,
                });
            }
        };
        let elapsed = tracker.elapsed();

        self.set(key, &value, data_type, false).await;
        inner.metrics.record_miss(Some(elapsed));

        Ok((value, Some(elapsed)))
    }

    // =========================================================================
    // Cancellable variants
    // =========================================================================

    /// [`get`](Self::get) that stops when `token` is cancelled
    pub async fn get_cancellable<T: DeserializeOwned>(
        &self,
        key: &str,
        data_type: DataType,
        token: &CancellationToken,
    ) -> Result<Option<T>> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(self.cancelled(key)),
            value = self.get(key, data_type) => Ok(value),
        }
    }

    /// [`set`](Self::set) that stops when `token` is cancelled
    pub async fn set_cancellable<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        data_type: DataType,
        force_fast: bool,
        token: &CancellationToken,
    ) -> Result<bool> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(self.cancelled(key)),
            stored = self.set(key, value, data_type, force_fast) => Ok(stored),
        }
    }

    /// [`get_or_compute`](Self::get_or_compute) that stops when `token` is
    /// cancelled; other callers waiting on the same key take over the
    /// computation
    pub async fn get_or_compute_cancellable<T, F, Fut>(
        &self,
        key: &str,
        producer: F,
        data_type: DataType,
        token: &CancellationToken,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(self.cancelled(key)),
            result = self.get_or_compute(key, producer, data_type) => result,
        }
    }

    fn cancelled(&self, key: &str) -> Error {
        tracing::debug!(key, "Cache operation cancelled");
        self.inner.metrics.record_cancellation();
        Error::Cancelled {
            key: key.to_string(),
        }
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Evict least-recently-used Fast tier keys down to the ceiling; returns
    /// the number evicted
    pub async fn manage_capacity(&self) -> usize {
        self.inner.manage_capacity().await
    }

    /// Ping both remote tiers; never fails
    pub async fn health_check(&self) -> HealthReport {
        let (fast, bulk) = futures::join!(self.ping(TierKind::Fast), self.ping(TierKind::Bulk));

        let status = if fast.status == HealthStatus::Healthy && bulk.status == HealthStatus::Healthy {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        HealthReport {
            status,
            fast_tier: fast,
            bulk_tier: bulk,
            local_fallback: LocalHealth {
                status: HealthStatus::Healthy,
                entries: self.inner.local.len(),
            },
            timestamp: chrono::Utc::now(),
        }
    }

    async fn ping(&self, tier: TierKind) -> TierHealth {
        let client = self.inner.client(tier);
        let timeout = self.inner.config.health_check_timeout;
        let tracker = LatencyTracker::start();

        let outcome = match tokio::time::timeout(timeout, client.ping()).await {
            Ok(result) => result,
            Err(_) => Err(Error::TierTimeout {
                tier: tier.name().to_string(),
                operation: "ping".into(),
                after: timeout,
            }),
        };

        match outcome {
            Ok(()) => TierHealth::up(tracker.elapsed()),
            Err(e) => {
                tracing::warn!(tier = tier.name(), error = %e, "Health check failed");
                TierHealth::down(e.to_string())
            }
        }
    }

    /// Wait for in-flight background promotions
    pub async fn flush_background(&self) {
        self.background.close();
        self.background.wait().await;
        self.background.reopen();
    }

    /// Drain background work and stop the attached monitor
    pub async fn close(&self) {
        self.background.close();
        self.background.wait().await;

        if let Some(monitor) = self.monitor() {
            monitor.shutdown();
        }

        let snapshot = self.metrics();
        tracing::info!(
            requests = snapshot.total_requests,
            hit_rate = snapshot.total_hit_rate_percent,
            "Cache orchestrator closed"
        );
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn setup() -> (CacheOrchestrator, Arc<InMemoryTier>, Arc<InMemoryTier>) {
        setup_with(CacheConfig::default())
    }

    fn setup_with(config: CacheConfig) -> (CacheOrchestrator, Arc<InMemoryTier>, Arc<InMemoryTier>) {
        let fast = Arc::new(InMemoryTier::new("fast"));
        let bulk = Arc::new(InMemoryTier::new("bulk"));
        let cache = CacheOrchestrator::new(fast.clone(), bulk.clone(), config).unwrap();
        (cache, fast, bulk)
    }

    #[tokio::test]
    async fn test_round_trip() {
        let (cache, _, _) = setup();

        assert!(cache.set("signals:btc", &vec![1.5f64, 2.5], DataType::Signals, false).await);
        let value: Option<Vec<f64>> = cache.get("signals:btc", DataType::Signals).await;
        assert_eq!(value, Some(vec![1.5, 2.5]));
    }

    #[tokio::test]
    async fn test_cold_set_goes_to_bulk_only() {
        let (cache, fast, bulk) = setup();

        cache.set("analysis:sol_score", &7u32, DataType::Analysis, false).await;

        assert_eq!(bulk.call_stats().sets, 1);
        assert_eq!(fast.call_stats().sets, 0);
        assert_eq!(bulk.ttl_of("analysis:sol_score"), Some(Duration::from_secs(1800)));
    }

    #[tokio::test]
    async fn test_hot_prefix_writes_both_tiers() {
        let (cache, fast, bulk) = setup();

        cache.set("ticker:ethusdt", &3_100.0f64, DataType::Ticker, false).await;

        assert_eq!(fast.call_stats().sets, 1);
        assert_eq!(bulk.call_stats().sets, 1);
        assert_eq!(fast.ttl_of("ticker:ethusdt"), Some(Duration::from_secs(5)));
        assert_eq!(bulk.ttl_of("ticker:ethusdt"), Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_force_fast() {
        let (cache, fast, _) = setup();
        cache.set("dashboard:overview", &1u8, DataType::Dashboard, true).await;
        assert!(fast.contains("dashboard:overview"));
    }

    #[tokio::test]
    async fn test_lookup_reports_tier() {
        let (cache, _, _) = setup();
        cache.set("ticker:btcusdt", &1u8, DataType::Ticker, false).await;
        cache.set("signals:btc", &2u8, DataType::Signals, false).await;

        let fast_hit = cache.lookup::<u8>("ticker:btcusdt", DataType::Ticker).await.unwrap();
        assert_eq!(fast_hit.tier, TierKind::Fast);

        let bulk_hit = cache.lookup::<u8>("signals:btc", DataType::Signals).await.unwrap();
        assert_eq!(bulk_hit.tier, TierKind::Bulk);
    }

    #[tokio::test]
    async fn test_promotion_after_threshold() {
        let (cache, fast, bulk) = setup();
        let codec = ValueCodec::new();
        bulk.seed("analysis:sol_score", codec.encode(&88u32).unwrap(), Duration::from_secs(1800));

        let _: Option<u32> = cache.get("analysis:sol_score", DataType::Analysis).await;
        cache.flush_background().await;
        assert!(!fast.was_written("analysis:sol_score"));

        let _: Option<u32> = cache.get("analysis:sol_score", DataType::Analysis).await;
        cache.flush_background().await;
        assert!(fast.was_written("analysis:sol_score"));
        assert_eq!(fast.ttl_of("analysis:sol_score"), Some(Duration::from_secs(300)));
        assert_eq!(cache.metrics().promotions, 1);

        let hit = cache.lookup::<u32>("analysis:sol_score", DataType::Analysis).await.unwrap();
        assert_eq!(hit.tier, TierKind::Fast);
    }

    #[tokio::test]
    async fn test_delete_resets_access_count() {
        let (cache, _, _) = setup();
        cache.set("signals:eth", &1u8, DataType::Signals, false).await;
        let _: Option<u8> = cache.get("signals:eth", DataType::Signals).await;
        assert_eq!(cache.access_count("signals:eth"), 1);

        assert!(cache.delete("signals:eth").await);
        assert_eq!(cache.access_count("signals:eth"), 0);
        assert!(!cache.delete("signals:eth").await);
    }

    #[tokio::test]
    async fn test_tier_failure_falls_through() {
        let (cache, fast, _) = setup();
        cache.set("ticker:solusdt", &150u32, DataType::Ticker, false).await;

        fast.set_available(false);
        let value: Option<u32> = cache.get("ticker:solusdt", DataType::Ticker).await;
        assert_eq!(value, Some(150));

        let snapshot = cache.metrics();
        assert_eq!(snapshot.bulk_hits, 1);
        assert_eq!(snapshot.connection_errors, 1);
    }

    #[tokio::test]
    async fn test_total_outage_uses_local_fallback() {
        let (cache, fast, bulk) = setup();
        fast.set_available(false);
        bulk.set_available(false);

        assert!(cache.set("orderbook:btcusdt", &"depth", DataType::Orderbook, false).await);
        let value: Option<String> = cache.get("orderbook:btcusdt", DataType::Orderbook).await;
        assert_eq!(value.as_deref(), Some("depth"));
        assert_eq!(cache.metrics().local_hits, 1);

        let health = cache.health_check().await;
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.fast_tier.status, HealthStatus::Unhealthy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_tier_times_out() {
        let config = CacheConfig {
            tier_timeout: Duration::from_millis(100),
            ..CacheConfig::default()
        };
        let (cache, fast, _) = setup_with(config);
        cache.set("ticker:btcusdt", &1u8, DataType::Ticker, false).await;

        fast.set_latency(Some(Duration::from_secs(1)));
        let hit = cache.lookup::<u8>("ticker:btcusdt", DataType::Ticker).await.unwrap();
        assert_eq!(hit.tier, TierKind::Bulk);
        assert!(cache.metrics().connection_errors >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let (cache, _, _) = setup();
        cache.set("orderbook:ethusdt", &1u8, DataType::Orderbook, false).await;

        tokio::time::advance(Duration::from_secs(3)).await;
        let value: Option<u8> = cache.get("orderbook:ethusdt", DataType::Orderbook).await;
        assert_eq!(value, Some(1), "bulk copy still live");

        tokio::time::advance(Duration::from_secs(8)).await;
        let value: Option<u8> = cache.get("orderbook:ethusdt", DataType::Orderbook).await;
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_get_or_compute_stores_result() {
        let (cache, _, bulk) = setup();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_compute(
                    "signals:sol",
                    || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(11u32)
                    },
                    DataType::Signals,
                )
                .await
                .unwrap();
            assert_eq!(value, 11);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(bulk.contains("signals:sol"));
        let snapshot = cache.metrics();
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.total_hits, 2);
    }

    #[tokio::test]
    async fn test_producer_error_propagates() {
        let (cache, _, _) = setup();

        let result: Result<u32> = cache
            .get_or_compute(
                "ticker:doge",
                || async { Err(anyhow::anyhow!("exchange returned 503")) },
                DataType::Ticker,
            )
            .await;

        assert_matches!(result, Err(Error::Compute { .. }));
        assert_eq!(cache.metrics().errors, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_producer_timeout() {
        let config = CacheConfig {
            compute_timeout: Duration::from_secs(1),
            ..CacheConfig::default()
        };
        let (cache, _, _) = setup_with(config);

        let result: Result<u32> = cache
            .get_or_compute(
                "analysis:slow",
                || async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(1)
                },
                DataType::Analysis,
            )
            .await;

        assert_matches!(result, Err(Error::ComputeTimeout { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_compute_records_cancellation() {
        let (cache, _, _) = setup();
        let token = CancellationToken::new();
        token.cancel();

        let result: Result<u32> = cache
            .get_or_compute_cancellable(
                "signals:btc",
                || async { Ok(1) },
                DataType::Signals,
                &token,
            )
            .await;

        assert_matches!(result, Err(Error::Cancelled { .. }));
        let snapshot = cache.metrics();
        assert_eq!(snapshot.cancellations, 1);
        assert_eq!(snapshot.total_requests, 0);
    }

    #[tokio::test]
    async fn test_manage_capacity_evicts_lru() {
        let config = CacheConfig {
            capacity: CapacityPolicy {
                max_fast_keys: 3,
                eviction_batch_size: 10,
            },
            ..CacheConfig::default()
        };
        let (cache, fast, _) = setup_with(config);

        for i in 0..5 {
            cache
                .set(&format!("ticker:coin{}", i), &i, DataType::Ticker, false)
                .await;
        }

        assert_eq!(cache.fast_tier_len(), 3);
        assert_eq!(cache.metrics().evictions, 2);
        assert!(!fast.contains("ticker:coin0"));
        assert!(!fast.contains("ticker:coin1"));
        assert!(fast.contains("ticker:coin4"));
    }

    #[tokio::test]
    async fn test_capacity_counts_keys_from_every_writer() {
        let config = CacheConfig {
            capacity: CapacityPolicy {
                max_fast_keys: 3,
                eviction_batch_size: 10,
            },
            ..CacheConfig::default()
        };
        let fast = Arc::new(InMemoryTier::new("fast"));
        let bulk = Arc::new(InMemoryTier::new("bulk"));
        let a = CacheOrchestrator::new(fast.clone(), bulk.clone(), config.clone()).unwrap();
        let b = CacheOrchestrator::new(fast.clone(), bulk.clone(), config).unwrap();

        for i in 0..3 {
            a.set(&format!("ticker:a{}", i), &i, DataType::Ticker, false).await;
        }
        for i in 0..3 {
            b.set(&format!("ticker:b{}", i), &i, DataType::Ticker, false).await;
        }

        assert_eq!(fast.key_count().await.unwrap(), 3);
        assert_eq!(b.manage_capacity().await, 0);
        assert_eq!(a.metrics().evictions + b.metrics().evictions, 3);
        assert!(fast.contains("ticker:b2"), "newest write survives");
        assert!(!fast.contains("ticker:a0"));
    }

    #[tokio::test]
    async fn test_cold_compute_reads_each_tier_once() {
        let (cache, fast, bulk) = setup();

        let value: u32 = cache
            .get_or_compute("analysis:eth_score", || async { Ok(61) }, DataType::Analysis)
            .await
            .unwrap();

        assert_eq!(value, 61);
        assert_eq!(fast.call_stats().gets, 1);
        assert_eq!(bulk.call_stats().gets, 1);
    }

    #[tokio::test]
    async fn test_compute_during_outage_counts_each_fault_once() {
        let (cache, fast, bulk) = setup();
        fast.set_available(false);
        bulk.set_available(false);

        let value: u32 = cache
            .get_or_compute("analysis:eth_score", || async { Ok(61) }, DataType::Analysis)
            .await
            .unwrap();
        assert_eq!(value, 61);

        // fast get, bulk get, bulk set
        let snapshot = cache.metrics();
        assert_eq!(snapshot.errors, 3);
        assert_eq!(snapshot.connection_errors, 3);
        assert_eq!(snapshot.misses, 1);

        let cached: Option<u32> = cache.get("analysis:eth_score", DataType::Analysis).await;
        assert_eq!(cached, Some(61));
    }

    #[tokio::test]
    async fn test_set_reports_local_fallback_write() {
        let (cache, fast, bulk) = setup();
        fast.set_available(false);
        bulk.set_available(false);

        assert!(cache.set("signals:ada", &3u8, DataType::Signals, false).await);
        assert_eq!(cache.health_check().await.local_fallback.entries, 1);

        bulk.set_available(true);
        assert!(cache.set("signals:ada", &4u8, DataType::Signals, false).await);
        assert_eq!(cache.health_check().await.local_fallback.entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_promotion_never_outlives_bulk_copy() {
        let (cache, fast, bulk) = setup();
        cache.set("default:daily_report", &5u32, DataType::Default, false).await;
        assert_eq!(bulk.ttl_of("default:daily_report"), Some(Duration::from_secs(3600)));

        tokio::time::advance(Duration::from_secs(3590)).await;
        for _ in 0..2 {
            let _: Option<u32> = cache.get("default:daily_report", DataType::Default).await;
        }
        cache.flush_background().await;

        assert_eq!(cache.metrics().promotions, 1);
        assert_eq!(fast.ttl_of("default:daily_report"), Some(Duration::from_secs(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_producer_runs() {
        let (cache, _, bulk) = setup();
        let token = CancellationToken::new();
        {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                token.cancel();
            });
        }

        let result: Result<u32> = cache
            .get_or_compute_cancellable(
                "analysis:slow_model",
                || async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(1)
                },
                DataType::Analysis,
                &token,
            )
            .await;

        assert_matches!(result, Err(Error::Cancelled { .. }));
        let snapshot = cache.metrics();
        assert_eq!(snapshot.cancellations, 1);
        assert_eq!(snapshot.misses, 0);
        assert_eq!(snapshot.total_hits, 0);
        assert!(!bulk.was_written("analysis:slow_model"));

        // The abandoned flight does not block the next caller
        let value: u32 = cache
            .get_or_compute("analysis:slow_model", || async { Ok(2) }, DataType::Analysis)
            .await
            .unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_follower_leaves_leader_running() {
        let (cache, _, bulk) = setup();
        let cache = Arc::new(cache);

        let leader = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .get_or_compute(
                        "signals:eth",
                        || async {
                            tokio::time::sleep(Duration::from_secs(5)).await;
                            Ok(9u32)
                        },
                        DataType::Signals,
                    )
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        let token = CancellationToken::new();
        {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                token.cancel();
            });
        }
        let follower: Result<u32> = cache
            .get_or_compute_cancellable("signals:eth", || async { Ok(0) }, DataType::Signals, &token)
            .await;
        assert_matches!(follower, Err(Error::Cancelled { .. }));

        assert_eq!(leader.await.unwrap().unwrap(), 9);
        assert!(bulk.contains("signals:eth"));
        let snapshot = cache.metrics();
        assert_eq!(snapshot.cancellations, 1);
        assert_eq!(snapshot.misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_slow_read() {
        let (cache, fast, _) = setup();
        fast.set_latency(Some(Duration::from_secs(4)));
        let token = CancellationToken::new();
        {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                token.cancel();
            });
        }

        let result: Result<Option<u32>> = cache
            .get_cancellable("ticker:btcusdt", DataType::Ticker, &token)
            .await;

        assert_matches!(result, Err(Error::Cancelled { .. }));
        let snapshot = cache.metrics();
        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.errors, 0);
        assert_eq!(snapshot.cancellations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_slow_write() {
        let (cache, fast, bulk) = setup();
        bulk.set_latency(Some(Duration::from_secs(4)));
        let token = CancellationToken::new();
        {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                token.cancel();
            });
        }

        let result = cache
            .set_cancellable("ticker:ethusdt", &3_100u32, DataType::Ticker, false, &token)
            .await;

        assert_matches!(result, Err(Error::Cancelled { .. }));
        assert!(!bulk.was_written("ticker:ethusdt"));
        assert!(!fast.was_written("ticker:ethusdt"));
        assert_eq!(cache.metrics().cancellations, 1);
    }

    #[tokio::test]
    async fn test_unencodable_value_is_rejected() {
        #[derive(serde::Serialize)]
        enum Opaque {
            #[serde(skip_serializing)]
            Hidden,
        }

        let (cache, _, bulk) = setup();

        assert!(!cache.set("default:opaque", &Opaque::Hidden, DataType::Default, false).await);
        assert_eq!(bulk.call_stats().sets, 0);
    }

    #[test]
    fn test_config_validation() {
        assert!(CacheConfig::default().validate().is_ok());

        let config = CacheConfig {
            tier_timeout: Duration::ZERO,
            ..CacheConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
