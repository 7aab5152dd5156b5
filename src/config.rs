//! Configuration loading and defaults.
//!
//! Configuration is TOML, read from an explicit path, the
//! `SYMBOL_SEARCH_CONFIG` environment variable, or
//! `<config dir>/symbol-search/config.toml`, in that order. A missing file at
//! the default location is not an error; defaults are used instead.
//!
//! ## Example
//!
//! ```toml
//! [shards]
//! root = "~/docs/html/search"
//!
//! [store]
//! failure_grace_ms = 2000
//!
//! [session]
//! max_results = 50
//! debounce_ms = 0
//! categories = ["functions"]
//!
//! [[categories]]
//! name = "all"
//! sections = "_abcdefghijklmnopqrstuvwxyz~"
//!
//! [[categories]]
//! name = "functions"
//! sections = "abcdefghilmnoprstuvw"
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "SYMBOL_SEARCH_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub shards: ShardsConfig,
    pub store: StoreConfig,
    pub session: SessionConfig,
    /// Symbol categories and their partition characters
    pub categories: Vec<CategoryConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shards: ShardsConfig::default(),
            store: StoreConfig::default(),
            session: SessionConfig::default(),
            categories: vec![CategoryConfig {
                name: "all".to_string(),
                sections: "abcdefghijklmnopqrstuvwxyz".to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardsConfig {
    /// Directory holding the shard files
    pub root: PathBuf,
}

impl Default for ShardsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("search"),
        }
    }
}

impl ShardsConfig {
    /// Root directory with a leading `~` expanded.
    pub fn resolved_root(&self) -> PathBuf {
        PathBuf::from(expand_tilde(&self.root.to_string_lossy()).as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// How long a failed shard load is remembered before retrying
    pub failure_grace_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            failure_grace_ms: 2000,
        }
    }
}

impl StoreConfig {
    pub const fn failure_grace(&self) -> Duration {
        Duration::from_millis(self.failure_grace_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum number of result groups per query
    pub max_results: usize,
    /// Delay before a revision starts loading; superseded revisions never load
    pub debounce_ms: u64,
    /// Categories searched by default (empty = all)
    pub categories: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_results: 50,
            debounce_ms: 0,
            categories: Vec::new(),
        }
    }
}

impl SessionConfig {
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    /// Leading characters with content, in partition order
    pub sections: String,
}

impl Config {
    /// Load configuration from `path`, the environment, or the default location.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::from_file(Path::new(&path));
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                tracing::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// `<config dir>/symbol-search/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("symbol-search").join("config.toml"))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Check cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for category in &self.categories {
            if category.name.is_empty() {
                return Err(invalid("category with an empty name"));
            }
            if !names.insert(category.name.as_str()) {
                return Err(invalid(format!("category '{}' defined twice", category.name)));
            }
            let mut seen = HashSet::new();
            if let Some(c) = category.sections.chars().find(|c| !seen.insert(*c)) {
                return Err(invalid(format!(
                    "category '{}' lists section '{}' twice",
                    category.name, c
                )));
            }
        }

        if let Some(unknown) = self
            .session
            .categories
            .iter()
            .find(|name| !names.contains(name.as_str()))
        {
            return Err(invalid(format!(
                "session category '{}' is not defined",
                unknown
            )));
        }

        if self.session.max_results == 0 {
            return Err(invalid("session.max_results must be at least 1"));
        }

        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.into(),
    }
}

/// Expands tilde (`~`) in a path to the user's home directory.
///
/// - `~/foo` becomes `/home/user/foo`
/// - `~` becomes `/home/user`
/// - Other paths are returned unchanged
pub fn expand_tilde(path: &str) -> Cow<'_, str> {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return Cow::Owned(home.join(stripped).display().to_string());
        }
    } else if path == "~"
        && let Some(home) = dirs::home_dir()
    {
        return Cow::Owned(home.display().to_string());
    }
    Cow::Borrowed(path)
}
