//! Single-flight memoization with TTL
//!
//! Wraps an expensive recomputation behind a time-bounded cache entry and
//! collapses concurrent cache-miss readers into one upstream computation.
//!
//! # State machine
//!
//! Each key moves through `EMPTY → COMPUTING → FRESH → STALE → COMPUTING → …`.
//! The first reader to find the entry empty or stale becomes the leader and
//! runs the computation; readers arriving while it is in flight wait on the
//! same result and all observe the same outcome, success or failure. A failed
//! computation is delivered to every waiter but never stored: the entry keeps
//! its previous value and expiry, so the next read recomputes again.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::{Error, Result};

/// Shared outcome of one computation, as seen by the leader and every
/// waiter that joined it
pub type SharedResult<T> = std::result::Result<T, Arc<Error>>;

/// Per-key cache entry
struct Entry<T> {
    /// Last successful value and when it was computed
    value: Option<(T, Instant)>,
    /// Receiver for the in-flight computation, if one is running
    inflight: Option<watch::Receiver<Option<SharedResult<T>>>>,
}

impl<T> Default for Entry<T> {
    fn default() -> Self {
        Self {
            value: None,
            inflight: None,
        }
    }
}

impl<T: Clone> Entry<T> {
    fn fresh_value(&self, ttl: Duration) -> Option<T> {
        self.value
            .as_ref()
            .filter(|(_, computed_at)| computed_at.elapsed() < ttl)
            .map(|(value, _)| value.clone())
    }

    /// Receiver for a live in-flight computation. A receiver whose sender
    /// is gone belongs to a leader that was cancelled mid-compute; it is
    /// discarded so a new leader can be elected.
    fn live_inflight(&mut self) -> Option<watch::Receiver<Option<SharedResult<T>>>> {
        match &self.inflight {
            Some(rx) if rx.has_changed().is_ok() => Some(rx.clone()),
            Some(_) => {
                self.inflight = None;
                None
            }
            None => None,
        }
    }
}

/// What a reader turned out to be for this pass over the entry
enum Role<T> {
    /// Entry was fresh; value served without an upstream call
    Hit(T),
    /// A computation is in flight; wait for its result
    Wait(watch::Receiver<Option<SharedResult<T>>>),
    /// This reader runs the computation and publishes the outcome
    Lead(watch::Sender<Option<SharedResult<T>>>),
}

/// Cache statistics tracked atomically
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Reads served from a fresh entry
    hits: AtomicU64,
    /// Reads that led a recomputation
    misses: AtomicU64,
    /// Reads that joined an in-flight recomputation instead of starting
    /// their own
    coalesced: AtomicU64,
}

/// Snapshot of cache statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStatsSnapshot {
    /// Reads served from a fresh entry
    pub hits: u64,
    /// Reads that led a recomputation
    pub misses: u64,
    /// Reads that joined an in-flight recomputation
    pub coalesced: u64,
}

/// Time-bounded memoization cache that deduplicates concurrent misses.
///
/// The TTL is fixed at construction and applies to every key.
pub struct SingleFlight<T> {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry<T>>>,
    stats: CacheStats,
}

impl<T: Clone + Send + Sync + 'static> SingleFlight<T> {
    /// Create a cache whose entries stay fresh for `ttl`
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
            stats: CacheStats::default(),
        }
    }

    /// Read through the cache, recomputing via `compute` on a miss.
    ///
    /// Concurrent callers that miss on the same key share one `compute`
    /// invocation and all receive its outcome. `compute` may be invoked
    /// again by the same call only if the previous leader was cancelled
    /// before publishing a result.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> SharedResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        loop {
            let role = {
                let mut entries = self.entries.lock();
                let entry = entries.entry(key.to_string()).or_default();
                if let Some(value) = entry.fresh_value(self.ttl) {
                    Role::Hit(value)
                } else if let Some(rx) = entry.live_inflight() {
                    Role::Wait(rx)
                } else {
                    let (tx, rx) = watch::channel(None);
                    entry.inflight = Some(rx);
                    Role::Lead(tx)
                }
            };

            match role {
                Role::Hit(value) => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(value);
                }
                Role::Wait(rx) => {
                    self.stats.coalesced.fetch_add(1, Ordering::Relaxed);
                    match wait_for_result(rx).await {
                        Some(outcome) => return outcome,
                        // Leader was cancelled before publishing; go around
                        // and elect a new one
                        None => continue,
                    }
                }
                Role::Lead(tx) => {
                    self.stats.misses.fetch_add(1, Ordering::Relaxed);
                    let outcome = compute().await.map_err(Arc::new);

                    {
                        let mut entries = self.entries.lock();
                        if let Some(entry) = entries.get_mut(key) {
                            entry.inflight = None;
                            // Failures are delivered to waiters but never
                            // stored; the entry keeps its previous value
                            // and expiry
                            if let Ok(value) = &outcome {
                                entry.value = Some((value.clone(), Instant::now()));
                            }
                        }
                    }

                    let _ = tx.send(Some(outcome.clone()));
                    return outcome;
                }
            }
        }
    }

    /// Snapshot the hit/miss/coalesced counters
    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            coalesced: self.stats.coalesced.load(Ordering::Relaxed),
        }
    }
}

/// Wait until the in-flight computation publishes, returning `None` if the
/// leader vanished without publishing (cancelled request).
async fn wait_for_result<T: Clone>(
    mut rx: watch::Receiver<Option<SharedResult<T>>>,
) -> Option<SharedResult<T>> {
    loop {
        if let Some(outcome) = rx.borrow_and_update().as_ref() {
            return Some(outcome.clone());
        }
        if rx.changed().await.is_err() {
            // Sender dropped; one last look in case it published first
            return rx.borrow().as_ref().cloned();
        }
    }
}
