//! Single-Flight Deduplication
//!
//! Collapses concurrent computations for the same key into one. The first
//! caller becomes the leader and runs the work; later callers subscribe to a
//! `watch` channel and receive a clone of the leader's result, errors
//! included. If the leader is dropped before finishing (cancelled or
//! panicked), waiting followers retry and one of them takes over.
//!
//! Every finished flight bumps a striped per-key epoch. A caller that reads
//! the epoch before its own cache lookup can tell whether another flight for
//! the key completed in between, and only then needs to look again.

use std::any::Any;
use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;

use crate::error::{Error, Result};

type Shared = std::result::Result<Arc<dyn Any + Send + Sync>, Error>;
type Slot = watch::Receiver<Option<Shared>>;

const EPOCH_STRIPES: usize = 64;

fn stripe(key: &str) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() as usize) % EPOCH_STRIPES
}

/// Which part a caller played in a flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightRole {
    /// Ran the computation
    Leader,
    /// Received the leader's result
    Follower,
}

/// In-flight computation registry
pub struct SingleFlight {
    calls: DashMap<String, (u64, Slot)>,
    ids: AtomicU64,
    epochs: Box<[AtomicU64]>,
}

impl Default for SingleFlight {
    fn default() -> Self {
        Self {
            calls: DashMap::new(),
            ids: AtomicU64::new(0),
            epochs: (0..EPOCH_STRIPES).map(|_| AtomicU64::new(0)).collect(),
        }
    }
}

/// Removes the registry entry when the leader finishes or is dropped
struct LeaderGuard<'a> {
    calls: &'a DashMap<String, (u64, Slot)>,
    epoch: &'a AtomicU64,
    key: String,
    id: u64,
    tx: watch::Sender<Option<Shared>>,
}

impl LeaderGuard<'_> {
    fn complete(self, result: Shared) {
        self.tx.send_replace(Some(result));
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        // Bumped before the entry goes so the next leader sees it
        self.epoch.fetch_add(1, Ordering::AcqRel);
        let id = self.id;
        self.calls.remove_if(&self.key, |_, (slot_id, _)| *slot_id == id);
    }
}

enum Join<'a> {
    Leader(LeaderGuard<'a>),
    Follower(Slot),
}

impl SingleFlight {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a computation in progress
    pub fn in_flight(&self) -> usize {
        self.calls.len()
    }

    /// Completion epoch for `key`; changes whenever a flight for it (or a
    /// key sharing its stripe) finishes
    pub fn epoch(&self, key: &str) -> u64 {
        self.epochs[stripe(key)].load(Ordering::Acquire)
    }

    fn join(&self, key: &str) -> Join<'_> {
        match self.calls.entry(key.to_string()) {
            Entry::Occupied(occupied) => Join::Follower(occupied.get().1.clone()),
            Entry::Vacant(vacant) => {
                let id = self.ids.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = watch::channel(None);
                vacant.insert((id, rx));
                Join::Leader(LeaderGuard {
                    calls: &self.calls,
                    epoch: &self.epochs[stripe(key)],
                    key: key.to_string(),
                    id,
                    tx,
                })
            }
        }
    }

    /// Run `work` for `key` unless another caller already is, in which case
    /// wait for and share its result.
    pub async fn run<T, F, Fut>(&self, key: &str, work: F) -> (Result<T>, FlightRole)
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        loop {
            match self.join(key) {
                Join::Leader(guard) => {
                    let result = work().await;
                    let shared: Shared = match &result {
                        Ok(value) => Ok(Arc::new(value.clone())),
                        Err(e) => Err(e.clone()),
                    };
                    guard.complete(shared);
                    return (result, FlightRole::Leader);
                }
                Join::Follower(mut rx) => {
                    let outcome = match rx.wait_for(Option::is_some).await {
                        Ok(done) => done.clone(),
                        Err(_) => None,
                    };

                    match outcome {
                        Some(Ok(value)) => match value.downcast_ref::<T>() {
                            Some(value) => return (Ok(value.clone()), FlightRole::Follower),
                            None => {
                                return (
                                    Err(Error::Internal(format!(
                                        "In-flight result for key {} has a different type",
                                        key
                                    ))),
                                    FlightRole::Follower,
                                )
                            }
                        },
                        Some(Err(e)) => return (Err(e), FlightRole::Follower),
                        None => {
                            tracing::debug!(key = %key, "Single-flight leader dropped, retrying");
                        }
                    }
                }
            }
        }
    }
}
