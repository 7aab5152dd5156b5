//! Parsed, immutable representation of one search-index shard.

mod literal;
mod parse;

use crate::error::ShardError;
use std::fmt;
use std::str::FromStr;

pub use parse::split_signature;

/// Stable identifier of a shard: a symbol category plus a partition bucket.
///
/// Displayed as `<category>_<partition>` with the partition in lowercase hex,
/// which is also the shard's file stem (`functions_5`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardId {
    category: String,
    partition: u32,
}

impl ShardId {
    pub fn new(category: impl Into<String>, partition: u32) -> Self {
        Self {
            category: category.into(),
            partition,
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub const fn partition(&self) -> u32 {
        self.partition
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{:x}", self.category, self.partition)
    }
}

impl FromStr for ShardId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (category, partition) = s
            .rsplit_once('_')
            .ok_or_else(|| format!("shard id '{}' has no partition suffix", s))?;
        if category.is_empty() {
            return Err(format!("shard id '{}' has an empty category", s));
        }
        let partition = u32::from_str_radix(partition, 16)
            .map_err(|e| format!("shard id '{}' has an invalid partition: {}", s, e))?;
        Ok(Self::new(category, partition))
    }
}

/// One documented location of a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    /// Qualifying context (owning namespace or type), may be empty.
    pub scope_label: String,
    /// Link to the documentation location. Never parsed, only passed through.
    pub anchor_url: String,
    /// Parameter list distinguishing overloads, e.g. `(UInt2 topLeft)`.
    pub signature_hint: Option<String>,
    /// Whether the link should open in the parent frame.
    pub opens_in_parent: bool,
}

impl Occurrence {
    /// Scope label with the signature re-attached, as it appears in the shard.
    pub fn qualified_label(&self) -> String {
        match &self.signature_hint {
            Some(signature) => format!("{}{}", self.scope_label, signature),
            None => self.scope_label.clone(),
        }
    }
}

/// One search-index record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Normalized search token, unique within its shard.
    pub key: String,
    /// Symbol name as shown in results.
    pub display_name: String,
    /// Never empty.
    pub occurrences: Vec<Occurrence>,
    /// Position of the entry in the shard file.
    pub ordinal: usize,
}

/// A parsed shard. Entries are kept sorted by key for binary-searched lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardIndex {
    id: ShardId,
    entries: Vec<Entry>,
}

impl ShardIndex {
    /// Parse and validate a shard's raw text.
    ///
    /// Fails with [`ShardError::Malformed`] on structural violations and
    /// [`ShardError::DuplicateKey`] when two entries share a key.
    pub fn parse(id: ShardId, raw: &str) -> Result<Self, ShardError> {
        let entries = parse::parse_entries(&id, raw)?;
        tracing::debug!("Parsed shard {} ({} entries)", id, entries.len());
        Ok(Self { id, entries })
    }

    /// An index with no entries.
    pub const fn empty(id: ShardId) -> Self {
        Self {
            id,
            entries: Vec::new(),
        }
    }

    pub const fn id(&self) -> &ShardId {
        &self.id
    }

    /// All entries in ascending key order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry with exactly this key.
    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries
            .binary_search_by(|entry| entry.key.as_str().cmp(key))
            .ok()
            .map(|index| &self.entries[index])
    }

    /// Entries whose key starts with `token`, in ascending key order.
    ///
    /// Keys sharing a prefix are contiguous in sorted order, so both bounds are
    /// found by binary search.
    pub fn lookup_prefix(&self, token: &str) -> &[Entry] {
        let start = self
            .entries
            .partition_point(|entry| entry.key.as_str() < token);
        let len = self.entries[start..].partition_point(|entry| entry.key.starts_with(token));
        &self.entries[start..start + len]
    }

    /// Serialize back into the shard script format, entries in file order.
    pub fn to_raw(&self) -> String {
        parse::render_entries(&self.entries)
    }
}
