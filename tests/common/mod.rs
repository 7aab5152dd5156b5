//! Shared test fixtures and utilities for integration tests.
//!
//! # Available Fixtures
//!
//! - [`TempShards`]: a temporary shard directory served by a real [`FsLoader`]
//! - [`GatedLoader`]: an in-memory loader whose loads block until released,
//!   for ordering concurrent revisions deterministically
//! - [`RecordingPresenter`]: keeps every result set a session presents

use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use symbol_search::config::CategoryConfig;
use symbol_search::{
    FsLoader, Presenter, QueryId, ResultSet, SearchSession, SessionOptions, ShardId,
    ShardLoadError, ShardLoader, ShardRouter, ShardStore,
};
use tempfile::TempDir;
use tokio::sync::Notify;

/// Returns the project root directory (where Cargo.toml lives).
pub fn project_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// The real `functions_5` shard shipped with the tests.
pub fn functions_5() -> String {
    let path = project_root().join("tests/fixtures/functions_5.js");
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read '{}': {}", path.display(), e))
}

/// Leading characters of the `functions` category, in partition order.
pub const FUNCTION_SECTIONS: &str = "abcdefghilmnoprstuvw";

/// Router with a single `functions` category.
pub fn functions_router() -> ShardRouter {
    ShardRouter::from_config(&[CategoryConfig {
        name: "functions".to_string(),
        sections: FUNCTION_SECTIONS.to_string(),
    }])
}

/// A temporary directory of shard files.
#[allow(dead_code)] // Methods used across different integration test crates
pub struct TempShards {
    _temp: TempDir,
    root: PathBuf,
}

#[allow(dead_code)] // Methods used across different integration test crates
impl TempShards {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let root = temp.path().to_path_buf();
        Self { _temp: temp, root }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Writes `<id>.js` with the given contents.
    pub fn write(&self, id: &str, content: &str) {
        let path = self.root.join(format!("{}.js", id));
        std::fs::write(&path, content)
            .unwrap_or_else(|e| panic!("Failed to write shard '{}': {}", id, e));
    }

    pub fn loader(&self) -> Arc<FsLoader> {
        Arc::new(FsLoader::new(&self.root))
    }
}

impl Default for TempShards {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory loader. Gated shards wait for [`GatedLoader::release`].
#[allow(dead_code)] // Methods used across different integration test crates
#[derive(Default)]
pub struct GatedLoader {
    bodies: HashMap<ShardId, String>,
    gates: Mutex<HashMap<ShardId, Arc<Notify>>>,
    calls: AtomicUsize,
}

#[allow(dead_code)] // Methods used across different integration test crates
impl GatedLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `id`.
    pub fn with_shard(mut self, id: ShardId, body: impl Into<String>) -> Self {
        self.bodies.insert(id, body.into());
        self
    }

    /// Hold loads of `id` until released.
    pub fn with_gate(self, id: ShardId) -> Self {
        self.gates
            .lock()
            .unwrap()
            .insert(id, Arc::new(Notify::new()));
        self
    }

    /// Let one pending (or the next) load of `id` finish.
    pub fn release(&self, id: &ShardId) {
        if let Some(gate) = self.gates.lock().unwrap().get(id) {
            gate.notify_one();
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ShardLoader for GatedLoader {
    fn load(&self, id: &ShardId) -> BoxFuture<'static, Result<String, ShardLoadError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gates.lock().unwrap().get(id).cloned();
        let body = self.bodies.get(id).cloned();
        let id = id.clone();
        async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            body.ok_or(ShardLoadError::Io {
                shard: id,
                message: "no such shard".to_string(),
            })
        }
        .boxed()
    }
}

/// Presenter keeping every delivered result set, in delivery order.
#[allow(dead_code)] // Methods used across different integration test crates
#[derive(Default)]
pub struct RecordingPresenter {
    presented: Mutex<Vec<ResultSet>>,
    notify: Notify,
}

#[allow(dead_code)] // Methods used across different integration test crates
impl RecordingPresenter {
    pub fn presented_ids(&self) -> Vec<QueryId> {
        self.presented
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.query_id)
            .collect()
    }

    /// Wait until results for `id` have been presented.
    pub async fn wait_for(&self, id: QueryId) -> ResultSet {
        let wait = async {
            loop {
                let notified = self.notify.notified();
                if let Some(found) = self
                    .presented
                    .lock()
                    .unwrap()
                    .iter()
                    .find(|r| r.query_id == id)
                    .cloned()
                {
                    return found;
                }
                notified.await;
            }
        };
        tokio::time::timeout(std::time::Duration::from_secs(5), wait)
            .await
            .unwrap_or_else(|_| panic!("Query {} was never presented", id))
    }
}

impl Presenter for RecordingPresenter {
    fn present(&self, results: ResultSet) {
        self.presented.lock().unwrap().push(results);
        self.notify.notify_waiters();
    }
}

/// Poll `condition` until it holds, failing after five seconds.
#[allow(dead_code)] // Used across different integration test crates
pub async fn eventually(mut condition: impl AsyncFnMut() -> bool) {
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while !condition().await {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition did not hold within 5s");
}

/// A session over `loader` with the `functions` router and a recording presenter.
#[allow(dead_code)] // Used across different integration test crates
pub fn recording_session(
    loader: Arc<dyn ShardLoader>,
    options: SessionOptions,
) -> (SearchSession, Arc<RecordingPresenter>) {
    let presenter = Arc::new(RecordingPresenter::default());
    let session = SearchSession::new(
        ShardStore::new(loader),
        functions_router(),
        presenter.clone(),
        options,
    );
    (session, presenter)
}
