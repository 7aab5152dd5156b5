//! Error types for shard parsing, shard loading and configuration.
//!
//! Library errors are `thiserror` enums so callers can react to the specific
//! failure; the binary and the MCP server wrap them with `anyhow` context.

use crate::shard::ShardId;
use std::path::PathBuf;
use thiserror::Error;

/// A specialized Result type for application-level code (binary, server).
pub type Result<T> = anyhow::Result<T>;

/// A shard's contents violate the shard format or its invariants.
///
/// Fatal for that shard only: the shard contributes no entries and the
/// owning query is reported as degraded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShardError {
    /// The raw text is not a well-formed shard.
    #[error("malformed shard '{shard}': {reason}")]
    Malformed { shard: ShardId, reason: String },

    /// Two entries share the same key.
    #[error("duplicate key '{key}' in shard '{shard}'")]
    DuplicateKey { shard: ShardId, key: String },
}

impl ShardError {
    pub(crate) fn malformed(shard: &ShardId, reason: impl Into<String>) -> Self {
        Self::Malformed {
            shard: shard.clone(),
            reason: reason.into(),
        }
    }
}

/// Loading a shard failed. Recoverable: retried after the failure grace period.
///
/// `Clone` because a single load result is shared by every caller awaiting it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShardLoadError {
    /// No file backs the requested shard id.
    #[error("shard '{shard}' not found at {}", path.display())]
    NotFound { shard: ShardId, path: PathBuf },

    /// The transport failed while reading the shard.
    #[error("failed to read shard '{shard}': {message}")]
    Io { shard: ShardId, message: String },

    /// The shard was read but could not be parsed.
    #[error(transparent)]
    Parse(#[from] ShardError),
}

impl ShardLoadError {
    /// The shard id this failure belongs to.
    pub fn shard(&self) -> &ShardId {
        match self {
            Self::NotFound { shard, .. } | Self::Io { shard, .. } => shard,
            Self::Parse(ShardError::Malformed { shard, .. })
            | Self::Parse(ShardError::DuplicateKey { shard, .. }) => shard,
        }
    }
}

/// Configuration could not be loaded or is inconsistent.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },
}
