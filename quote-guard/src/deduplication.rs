use crate::error::{Error, Result};
use crate::key::DedupKey;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::{Future, FutureExt};
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "graphql")]
use async_graphql::SimpleObject;

/// How long a successful result stays attachable after it resolved
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Configuration for request deduplication
#[derive(Clone, Debug)]
pub struct DeduplicationConfig {
    /// How long a resolved request keeps serving late duplicates
    pub grace_period: Duration,
    /// Whether deduplication is enabled
    pub enabled: bool,
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            enabled: true,
        }
    }
}

type SharedOutcome<T> = Shared<BoxFuture<'static, Result<T>>>;

/// One in-flight (or recently resolved) request
struct PendingRequest<T> {
    outcome: SharedOutcome<T>,
    created_at: Instant,
    waiters: Arc<AtomicUsize>,
    generation: u64,
}

#[derive(Default)]
struct Counters {
    total_requests: AtomicU64,
    deduped_requests: AtomicU64,
}

struct Inner<T> {
    pending: DashMap<DedupKey, PendingRequest<T>>,
    counters: Counters,
    next_generation: AtomicU64,
    config: DeduplicationConfig,
    shutdown: CancellationToken,
}

impl<T> Inner<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Drop the entry for `key` if it is still the given instance
    fn evict(&self, key: &DedupKey, generation: u64) -> bool {
        self.pending
            .remove_if(key, |_, pending| pending.generation == generation)
            .is_some()
    }

    /// Remove a resolved entry once the grace period is over.
    ///
    /// The age check is made when the timer fires, so a late timer can leave
    /// the entry around slightly longer than the grace period.
    fn evict_settled(&self, key: &DedupKey, generation: u64) {
        let grace_period = self.config.grace_period;
        let removed = self.pending.remove_if(key, |_, pending| {
            pending.generation == generation && pending.created_at.elapsed() >= grace_period
        });
        if removed.is_some() {
            log::debug!("Grace period over, released key: {:?}", key);
        }
    }

    fn schedule_eviction(self: &Arc<Self>, key: DedupKey, generation: u64) {
        let grace_period = self.config.grace_period;
        let token = self.shutdown.child_token();
        let inner = Arc::downgrade(self);

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(grace_period) => {
                    if let Some(inner) = inner.upgrade() {
                        inner.evict_settled(&key, generation);
                    }
                }
            }
        });
    }
}

/// Result of a deduplicated call
#[derive(Clone, Debug, PartialEq)]
pub struct Deduplicated<T> {
    pub data: T,
    /// `true` if this caller attached to a request somebody else started
    pub deduped: bool,
    /// Callers that had attached to the request when this one got its result
    pub waiters: usize,
}

/// Request deduplication system
///
/// When identical requests overlap, only the first one runs its executor and
/// every caller receives a clone of the same result (or the same failure).
/// A successful result keeps being shared for a short grace period so that
/// near-simultaneous duplicates are absorbed too. Failures are never kept.
///
/// No timeout is applied here: an executor that never resolves leaves all of
/// its waiters pending. Callers wrap the executor in their own timeout.
pub struct RequestDeduplicator<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Default for RequestDeduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(DeduplicationConfig::default())
    }
}

impl<T> RequestDeduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(config: DeduplicationConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                pending: DashMap::new(),
                counters: Counters::default(),
                next_generation: AtomicU64::new(0),
                config,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn config(&self) -> &DeduplicationConfig {
        &self.inner.config
    }

    /// Run `executor` unless an identical request is already in flight
    ///
    /// `params` only identifies the request; the executor captures whatever it
    /// needs itself. The executor is driven to completion on the runtime even
    /// if the caller that started it goes away.
    pub async fn deduplicate<P, F, Fut, E>(&self, params: &P, executor: F) -> Result<Deduplicated<T>>
    where
        P: Serialize + ?Sized,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let key = DedupKey::from_params(params)?;
        self.inner
            .counters
            .total_requests
            .fetch_add(1, Ordering::Relaxed);

        // Without eviction timers a cached result would be served forever, so
        // a shut down deduplicator stops sharing work.
        if !self.inner.config.enabled || self.inner.shutdown.is_cancelled() {
            let data = run_executor(executor).await?;
            return Ok(Deduplicated {
                data,
                deduped: false,
                waiters: 1,
            });
        }

        // Lookup and insert happen under the same shard lock, so exactly one
        // caller per key ends up starting the executor.
        let (deduped, outcome, waiters) = match self.inner.pending.entry(key.clone()) {
            Entry::Occupied(entry) => {
                let pending = entry.get();
                pending.waiters.fetch_add(1, Ordering::SeqCst);
                log::debug!("Request already pending for key: {:?}", key);
                (true, pending.outcome.clone(), Arc::clone(&pending.waiters))
            }
            Entry::Vacant(entry) => {
                let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
                let outcome = self.start(key.clone(), generation, executor);
                let waiters = Arc::new(AtomicUsize::new(1));
                entry.insert(PendingRequest {
                    outcome: outcome.clone(),
                    created_at: Instant::now(),
                    waiters: Arc::clone(&waiters),
                    generation,
                });
                log::debug!("Executing new request for key: {:?}", key);
                (false, outcome, waiters)
            }
        };

        if deduped {
            self.inner
                .counters
                .deduped_requests
                .fetch_add(1, Ordering::Relaxed);
        } else {
            tokio::spawn(outcome.clone());
        }

        let data = outcome.await?;
        Ok(Deduplicated {
            data,
            deduped,
            waiters: waiters.load(Ordering::SeqCst),
        })
    }

    /// Build the shared computation for a new entry.
    ///
    /// Settling the map happens inside the future, before its output becomes
    /// visible, so nobody can observe a failure and then attach to it.
    fn start<F, Fut, E>(&self, key: DedupKey, generation: u64, executor: F) -> SharedOutcome<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let inner: Weak<Inner<T>> = Arc::downgrade(&self.inner);

        async move {
            let outcome = run_executor(executor).await;

            if let Some(inner) = inner.upgrade() {
                match &outcome {
                    Ok(_) => inner.schedule_eviction(key, generation),
                    Err(err) => {
                        log::warn!("Request failed for key: {:?}: {}", key, err);
                        inner.evict(&key, generation);
                    }
                }
            }

            outcome
        }
        .boxed()
        .shared()
    }

    /// Get statistics about deduplicated requests
    pub fn stats(&self) -> DeduplicationStats {
        let total_requests = self.inner.counters.total_requests.load(Ordering::Relaxed);
        let deduped_requests = self.inner.counters.deduped_requests.load(Ordering::Relaxed);

        DeduplicationStats {
            total_requests,
            deduped_requests,
            api_calls_saved: deduped_requests,
            savings_rate: savings_rate(deduped_requests, total_requests),
            pending_requests: self.inner.pending.len(),
        }
    }

    /// Number of distinct keys currently held
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// Reset the counters. Pending requests are left alone.
    pub fn reset_stats(&self) {
        self.inner.counters.total_requests.store(0, Ordering::Relaxed);
        self.inner.counters.deduped_requests.store(0, Ordering::Relaxed);
        log::info!("Request deduplicator statistics reset");
    }

    /// Stop every scheduled grace-period eviction
    pub fn shutdown(&self) {
        if !self.inner.shutdown.is_cancelled() {
            self.inner.shutdown.cancel();
            log::info!("Request deduplicator shut down");
        }
    }
}

impl<T> Drop for RequestDeduplicator<T> {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}

/// Await `executor`, turning its error or panic into an [`Error`]
async fn run_executor<T, F, Fut, E>(executor: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    match AssertUnwindSafe(async move { executor().await })
        .catch_unwind()
        .await
    {
        Ok(Ok(data)) => Ok(data),
        Ok(Err(err)) => Err(Error::ExecutorFailed(Arc::new(err))),
        Err(_) => Err(Error::ExecutorPanicked),
    }
}

/// Share of calls answered by an existing request, as a rounded percentage
fn savings_rate(deduped: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    (deduped as f64 * 100.0 / total as f64).round() as u32
}

/// Statistics for request deduplication
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct DeduplicationStats {
    pub total_requests: u64,
    pub deduped_requests: u64,
    pub api_calls_saved: u64,
    /// Percentage of requests that did not reach the provider
    pub savings_rate: u32,
    pub pending_requests: usize,
}

/// Thread-safe wrapper for the deduplicator
pub type SharedRequestDeduplicator<T> = Arc<RequestDeduplicator<T>>;
