//! Shard I/O capability injected into the store.

use crate::error::ShardLoadError;
use crate::shard::ShardId;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::path::PathBuf;

/// Fetches the raw text of a shard. The only component that performs I/O.
pub trait ShardLoader: Send + Sync + 'static {
    fn load(&self, id: &ShardId) -> BoxFuture<'static, Result<String, ShardLoadError>>;
}

/// File extensions tried in order when resolving a shard file.
const SHARD_EXTENSIONS: &[&str] = &["js", "json"];

/// Loads shards from `<root>/<shard id>.js` (or `.json`).
#[derive(Debug, Clone)]
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the first candidate file for a shard.
    pub fn shard_path(&self, id: &ShardId) -> PathBuf {
        self.root.join(format!("{}.{}", id, SHARD_EXTENSIONS[0]))
    }
}

impl ShardLoader for FsLoader {
    fn load(&self, id: &ShardId) -> BoxFuture<'static, Result<String, ShardLoadError>> {
        let root = self.root.clone();
        let id = id.clone();

        async move {
            for extension in SHARD_EXTENSIONS {
                let path = root.join(format!("{}.{}", id, extension));
                match tokio::fs::read_to_string(&path).await {
                    Ok(content) => {
                        tracing::debug!("Read shard {} from {}", id, path.display());
                        return Ok(content);
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        return Err(ShardLoadError::Io {
                            shard: id,
                            message: format!("{}: {}", path.display(), e),
                        });
                    }
                }
            }

            Err(ShardLoadError::NotFound {
                path: root.join(format!("{}.{}", id, SHARD_EXTENSIONS[0])),
                shard: id,
            })
        }
        .boxed()
    }
}
