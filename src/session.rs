//! Live search over a stream of query revisions.
//!
//! Every call to [`SearchSession::on_input`] starts a new revision with a
//! higher [`QueryId`]. Revisions load their shards concurrently on spawned
//! tasks; when one finishes, its results are delivered only if it is still the
//! current revision. Superseded loads are not aborted, they keep warming the
//! shard cache, but their results are dropped.

use crate::engine::{self, ResultGroup};
use crate::routing::ShardRouter;
use crate::shard::ShardId;
use crate::store::ShardStore;
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Monotonically increasing identifier of a query revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueryId(pub u64);

impl std::fmt::Display for QueryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Results of one settled revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet {
    pub query_id: QueryId,
    pub query: String,
    pub groups: Vec<ResultGroup>,
    /// Set when at least one shard could not be searched
    pub degraded: bool,
    /// Shards that failed to load or parse
    pub failed_shards: Vec<ShardId>,
}

impl ResultSet {
    fn empty(query_id: QueryId, query: String) -> Self {
        Self {
            query_id,
            query,
            groups: Vec::new(),
            degraded: false,
            failed_shards: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Pending(QueryId),
    Settled(QueryId, ResultSet),
}

/// Receives the result set of each settled revision.
///
/// Called with the session lock held: implementations must not call back
/// into the session.
pub trait Presenter: Send + Sync + 'static {
    fn present(&self, results: ResultSet);
}

/// Presenter publishing the latest result set on a watch channel.
#[derive(Debug)]
pub struct ChannelPresenter {
    tx: watch::Sender<Option<ResultSet>>,
}

impl ChannelPresenter {
    pub fn new() -> (Self, watch::Receiver<Option<ResultSet>>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }
}

impl Presenter for ChannelPresenter {
    fn present(&self, results: ResultSet) {
        self.tx.send_replace(Some(results));
    }
}

/// Tunables for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub max_results: usize,
    pub debounce: Duration,
    /// Active categories (empty = all)
    pub categories: Vec<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_results: 50,
            debounce: Duration::ZERO,
            categories: Vec::new(),
        }
    }
}

/// A live search session. Dropping it disposes it.
pub struct SearchSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    store: ShardStore,
    router: ShardRouter,
    presenter: Arc<dyn Presenter>,
    max_results: usize,
    debounce: Duration,
    next_id: AtomicU64,
    cancel: CancellationToken,
    core: Mutex<SessionCore>,
}

struct SessionCore {
    state: SessionState,
    current: Option<QueryId>,
    query: String,
    categories: Vec<String>,
}

impl std::fmt::Debug for SearchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchSession")
            .field("state", &self.state())
            .field("disposed", &self.inner.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl SearchSession {
    pub fn new(
        store: ShardStore,
        router: ShardRouter,
        presenter: Arc<dyn Presenter>,
        options: SessionOptions,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                store,
                router,
                presenter,
                max_results: options.max_results,
                debounce: options.debounce,
                next_id: AtomicU64::new(1),
                cancel: CancellationToken::new(),
                core: Mutex::new(SessionCore {
                    state: SessionState::Idle,
                    current: None,
                    query: String::new(),
                    categories: options.categories,
                }),
            }),
        }
    }

    /// Start a new revision for `query`. Results arrive through the presenter.
    ///
    /// Must be called from within a Tokio runtime. Returns the revision id, or
    /// `None` once the session is disposed.
    pub fn on_input(&self, query: &str) -> Option<QueryId> {
        if self.inner.cancel.is_cancelled() {
            tracing::debug!("Ignoring input on disposed session");
            return None;
        }

        let mut core = self.inner.lock_core();
        // dispose() may have run while we waited for the lock
        if self.inner.cancel.is_cancelled() {
            return None;
        }
        let id = QueryId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        core.current = Some(id);
        core.query = query.to_string();

        let shards = self.inner.router.route(query, &core.categories);
        if shards.is_empty() {
            // Empty query or no shard covers it: settle right away.
            tracing::debug!("Query {} '{}' needs no shards", id, query);
            let results = ResultSet::empty(id, query.to_string());
            core.state = SessionState::Settled(id, results.clone());
            self.inner.presenter.present(results);
            return Some(id);
        }

        core.state = SessionState::Pending(id);
        drop(core);

        tracing::debug!("Query {} '{}' pending on {} shard(s)", id, query, shards.len());
        let inner = Arc::clone(&self.inner);
        let query = query.to_string();
        tokio::spawn(async move {
            let cancel = inner.cancel.clone();
            tokio::select! {
                () = cancel.cancelled() => {}
                () = inner.run_revision(id, query, shards) => {}
            }
        });

        Some(id)
    }

    /// Restrict searches to `categories` (empty = all) and re-run the current query.
    pub fn set_categories(&self, categories: Vec<String>) -> Option<QueryId> {
        let query = {
            let mut core = self.inner.lock_core();
            core.categories = categories;
            core.current.map(|_| core.query.clone())
        };
        query.and_then(|query| self.on_input(&query))
    }

    /// Restrict searches to `categories` for the next input, without re-running.
    pub fn set_category_filter(&self, categories: Vec<String>) {
        self.inner.lock_core().categories = categories;
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock_core().state.clone()
    }

    pub fn current_query_id(&self) -> Option<QueryId> {
        self.inner.lock_core().current
    }

    pub fn categories(&self) -> Vec<String> {
        self.inner.lock_core().categories.clone()
    }

    pub fn store(&self) -> &ShardStore {
        &self.inner.store
    }

    pub fn router(&self) -> &ShardRouter {
        &self.inner.router
    }

    /// Stop all outstanding revisions and return to `Idle`.
    ///
    /// Later input is ignored. The shard cache is released when the last
    /// handle to the store drops.
    pub fn dispose(&self) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        self.inner.cancel.cancel();
        let mut core = self.inner.lock_core();
        core.state = SessionState::Idle;
        core.current = None;
        tracing::debug!("Search session disposed");
    }
}

impl Drop for SearchSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl SessionInner {
    fn lock_core(&self) -> MutexGuard<'_, SessionCore> {
        // Poisoning only means a presenter panicked; the state itself is intact.
        self.core
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn is_current(&self, id: QueryId) -> bool {
        self.lock_core().current == Some(id)
    }

    async fn run_revision(&self, id: QueryId, query: String, shards: Vec<ShardId>) {
        if !self.debounce.is_zero() {
            tokio::time::sleep(self.debounce).await;
            if !self.is_current(id) {
                tracing::trace!("Query {} superseded during debounce", id);
                return;
            }
        }

        let outcomes = join_all(shards.iter().map(|shard| self.store.get(shard))).await;

        let mut loaded = Vec::with_capacity(outcomes.len());
        let mut failed_shards = Vec::new();
        for (shard, outcome) in shards.into_iter().zip(outcomes) {
            match outcome {
                Ok(index) => loaded.push(index),
                Err(e) => {
                    tracing::warn!("Query {} searching without shard {}: {}", id, shard, e);
                    failed_shards.push(shard);
                }
            }
        }

        let groups = engine::search(&query, &loaded, Some(self.max_results));
        let results = ResultSet {
            query_id: id,
            query,
            groups,
            degraded: !failed_shards.is_empty(),
            failed_shards,
        };

        let mut core = self.lock_core();
        if core.current != Some(id) || self.cancel.is_cancelled() {
            tracing::debug!("Discarding stale results for query {}", id);
            return;
        }
        tracing::debug!(
            "Query {} settled with {} group(s){}",
            id,
            results.groups.len(),
            if results.degraded { " (degraded)" } else { "" }
        );
        core.state = SessionState::Settled(id, results.clone());
        self.presenter.present(results);
    }
}
