//! Incremental symbol search over sharded documentation indexes.
//!
//! Documentation generators split their search index into shards, one per
//! category and leading character. This crate loads shards lazily through a
//! [`ShardLoader`], caches them in a [`ShardStore`], ranks matches with
//! [`engine::search`], and drives live queries through a [`SearchSession`]
//! that only ever presents the results of the latest query.

pub mod config;
pub mod engine;
pub mod error;
pub mod loader;
pub mod logging;
pub mod normalize;
pub mod routing;
pub mod server;
pub mod session;
pub mod shard;
pub mod store;
pub mod tools;

pub use config::Config;
pub use engine::{MatchKind, ResultGroup};
pub use error::{ConfigError, Result, ShardError, ShardLoadError};
pub use loader::{FsLoader, ShardLoader};
pub use routing::ShardRouter;
pub use server::SymbolServer;
pub use session::{
    ChannelPresenter, Presenter, QueryId, ResultSet, SearchSession, SessionOptions, SessionState,
};
pub use shard::{Entry, Occurrence, ShardId, ShardIndex};
pub use store::{ShardStore, StoreStats};
