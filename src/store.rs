//! Lazy shard cache with single-flight loading.
//!
//! Shards are loaded on first request through the injected [`ShardLoader`],
//! parsed once and kept for the lifetime of the store. Callers asking for a
//! shard that is already loading await the same shared future instead of
//! starting another load.

use crate::error::ShardLoadError;
use crate::loader::ShardLoader;
use crate::shard::{ShardId, ShardIndex};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Default time a failed load is remembered before it may be retried.
pub const DEFAULT_FAILURE_GRACE: Duration = Duration::from_secs(2);

/// Type alias for shared shard load futures.
type SharedLoad = Shared<BoxFuture<'static, Result<Arc<ShardIndex>, ShardLoadError>>>;

/// Shard cache keyed by shard id. Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct ShardStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    loader: Arc<dyn ShardLoader>,
    failure_grace: Duration,
    state: Mutex<StoreState>,
    hits: AtomicU64,
    loads: AtomicU64,
    failures: AtomicU64,
}

#[derive(Default)]
struct StoreState {
    /// Parsed shards, never evicted
    cache: HashMap<ShardId, Arc<ShardIndex>>,
    /// In-flight loads (can be awaited by multiple callers)
    in_flight: HashMap<ShardId, SharedLoad>,
    /// Recent failures, served until the grace period elapses
    failed: HashMap<ShardId, FailedLoad>,
}

struct FailedLoad {
    error: ShardLoadError,
    at: Instant,
}

/// Counters describing store activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    pub cached: usize,
    pub in_flight: usize,
    pub hits: u64,
    pub loads: u64,
    pub failures: u64,
}

impl std::fmt::Debug for ShardStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardStore")
            .field("failure_grace", &self.inner.failure_grace)
            .field("loads", &self.inner.loads.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl ShardStore {
    /// Create a store with the default failure grace period.
    pub fn new(loader: Arc<dyn ShardLoader>) -> Self {
        Self::with_failure_grace(loader, DEFAULT_FAILURE_GRACE)
    }

    pub fn with_failure_grace(loader: Arc<dyn ShardLoader>, failure_grace: Duration) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                loader,
                failure_grace,
                state: Mutex::new(StoreState::default()),
                hits: AtomicU64::new(0),
                loads: AtomicU64::new(0),
                failures: AtomicU64::new(0),
            }),
        }
    }

    /// Get a shard, waiting for an in-flight load if needed.
    ///
    /// 1. Returns the cached index
    /// 2. Returns a remembered failure while its grace period lasts
    /// 3. Joins the in-flight load, or starts one
    pub async fn get(&self, id: &ShardId) -> Result<Arc<ShardIndex>, ShardLoadError> {
        let load = {
            let mut state = self.inner.state.lock().await;

            if let Some(index) = state.cache.get(id) {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Cache hit for shard {}", id);
                return Ok(Arc::clone(index));
            }

            if let Some(failed) = state.failed.get(id) {
                if failed.at.elapsed() < self.inner.failure_grace {
                    tracing::trace!("Serving remembered failure for shard {}", id);
                    return Err(failed.error.clone());
                }
                state.failed.remove(id);
            }

            if let Some(load) = state.in_flight.get(id) {
                tracing::debug!("Awaiting in-flight load for shard {}", id);
                load.clone()
            } else {
                let load = self.start_load(id.clone());
                state.in_flight.insert(id.clone(), load.clone());
                load
            }
        };

        load.await
    }

    /// Best-effort background loading. Failures are logged, never returned.
    pub async fn preload(&self, ids: &[ShardId]) {
        let handles: Vec<_> = ids
            .iter()
            .cloned()
            .map(|id| {
                let store = self.clone();
                tokio::spawn(async move {
                    if let Err(e) = store.get(&id).await {
                        tracing::warn!("Preloading shard {} failed: {}", id, e);
                    }
                })
            })
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!("Preload task panicked: {}", e);
            }
        }
    }

    /// Build the shared load future for a shard.
    ///
    /// The load runs on its own task and settles the store state itself, so
    /// it completes and records its outcome even when every caller has gone.
    fn start_load(&self, id: ShardId) -> SharedLoad {
        tracing::info!("Loading shard {}", id);
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn({
            let id = id.clone();
            async move { inner.load_and_settle(id).await }
        });

        let load: BoxFuture<'static, Result<Arc<ShardIndex>, ShardLoadError>> = Box::pin(async move {
            task.await.unwrap_or_else(|e| {
                Err(ShardLoadError::Io {
                    shard: id,
                    message: format!("load task failed: {}", e),
                })
            })
        });

        load.shared()
    }

    /// Check if a shard is cached.
    pub async fn is_cached(&self, id: &ShardId) -> bool {
        self.inner.state.lock().await.cache.contains_key(id)
    }

    /// Check if a load is in progress for a shard.
    pub async fn is_loading(&self, id: &ShardId) -> bool {
        self.inner.state.lock().await.in_flight.contains_key(id)
    }

    /// Ids of all cached shards, sorted.
    pub async fn cached_ids(&self) -> Vec<ShardId> {
        let mut ids: Vec<_> = self.inner.state.lock().await.cache.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn stats(&self) -> StoreStats {
        let state = self.inner.state.lock().await;
        StoreStats {
            cached: state.cache.len(),
            in_flight: state.in_flight.len(),
            hits: self.inner.hits.load(Ordering::Relaxed),
            loads: self.inner.loads.load(Ordering::Relaxed),
            failures: self.inner.failures.load(Ordering::Relaxed),
        }
    }
}

impl StoreInner {
    async fn load_and_settle(&self, id: ShardId) -> Result<Arc<ShardIndex>, ShardLoadError> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        let result = match self.loader.load(&id).await {
            Ok(raw) => ShardIndex::parse(id.clone(), &raw)
                .map(Arc::new)
                .map_err(ShardLoadError::from),
            Err(e) => Err(e),
        };

        let mut state = self.state.lock().await;
        state.in_flight.remove(&id);
        match &result {
            Ok(index) => {
                state.cache.insert(id.clone(), Arc::clone(index));
                tracing::debug!("Cached shard {} ({} entries)", id, index.len());
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Failed to load shard {}: {}", id, e);
                state.failed.insert(
                    id,
                    FailedLoad {
                        error: e.clone(),
                        at: Instant::now(),
                    },
                );
            }
        }

        result
    }
}
