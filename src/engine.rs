//! Matching, ranking and grouping of shard entries against a query.
//!
//! Everything here is synchronous and pure: the same query over the same
//! shards always yields the same groups in the same order.

use crate::normalize::normalize_query;
use crate::shard::{Entry, Occurrence, ShardId, ShardIndex};
use ahash::AHashMap;
use std::cmp::Ordering;
use std::sync::Arc;

/// How a key matched the query, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchKind {
    /// The key equals the query.
    Exact,
    /// The key starts with the query.
    Prefix,
    /// The query occurs inside the key.
    Substring,
}

impl MatchKind {
    /// Classify `key` against an already-normalized query.
    ///
    /// Hits starting inside a `_xx` escape do not count: `5f` does not match
    /// `set_5fx`.
    pub fn classify(key: &str, query: &str) -> Option<Self> {
        let start = key
            .match_indices(query)
            .map(|(start, _)| start)
            .find(|&start| !inside_escape(key, start))?;
        match start {
            0 if key.len() == query.len() => Some(Self::Exact),
            0 => Some(Self::Prefix),
            _ => Some(Self::Substring),
        }
    }
}

/// Whether byte `pos` of an escaped key falls after the `_` of a `_xx` escape.
fn inside_escape(key: &str, pos: usize) -> bool {
    let bytes = key.as_bytes();
    let mut i = 0;
    while i < pos {
        if bytes[i] == b'_' {
            if pos < i + 3 {
                return true;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    false
}

/// All occurrences of one display name within one shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultGroup {
    pub display_name: String,
    /// Key of the best-ranked entry in the group.
    pub key: String,
    pub shard: ShardId,
    pub match_kind: MatchKind,
    /// In shard order: entry position in the file, then occurrence order.
    pub occurrences: Vec<Occurrence>,
}

/// Search several shards. Groups never span shards.
pub fn search(
    query: &str,
    shards: &[Arc<ShardIndex>],
    max_results: Option<usize>,
) -> Vec<ResultGroup> {
    search_sources(
        query,
        shards.iter().map(|shard| (shard.id(), shard.entries())),
        max_results,
    )
}

/// Search a single sequence of entries belonging to `shard`.
pub fn search_entries(
    query: &str,
    shard: &ShardId,
    entries: &[Entry],
    max_results: Option<usize>,
) -> Vec<ResultGroup> {
    search_sources(query, std::iter::once((shard, entries)), max_results)
}

/// Rank of a candidate group; compared field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rank {
    kind: MatchKind,
    key_len: usize,
}

struct Candidate<'a> {
    shard_pos: usize,
    shard: &'a ShardId,
    display_name: &'a str,
    best: Rank,
    best_key: &'a str,
    members: Vec<&'a Entry>,
}

impl Candidate<'_> {
    fn first_ordinal(&self) -> usize {
        self.members.iter().map(|e| e.ordinal).min().unwrap_or(0)
    }

    /// Exact before prefix before substring, then shorter key, then display
    /// name; shard position and file position make the order total.
    fn cmp_rank(&self, other: &Self) -> Ordering {
        self.best
            .kind
            .cmp(&other.best.kind)
            .then(self.best.key_len.cmp(&other.best.key_len))
            .then_with(|| self.display_name.cmp(other.display_name))
            .then(self.shard_pos.cmp(&other.shard_pos))
            .then_with(|| self.first_ordinal().cmp(&other.first_ordinal()))
    }
}

fn search_sources<'a>(
    query: &str,
    sources: impl Iterator<Item = (&'a ShardId, &'a [Entry])>,
    max_results: Option<usize>,
) -> Vec<ResultGroup> {
    let query = normalize_query(query);
    if query.is_empty() {
        return vec![];
    }

    let mut candidates: Vec<Candidate<'a>> = Vec::new();
    let mut by_name: AHashMap<(usize, &'a str), usize> = AHashMap::new();

    for (shard_pos, (shard, entries)) in sources.enumerate() {
        for entry in entries {
            let Some(kind) = MatchKind::classify(&entry.key, &query) else {
                continue;
            };
            let rank = Rank {
                kind,
                key_len: entry.key.len(),
            };

            match by_name.get(&(shard_pos, entry.display_name.as_str())) {
                Some(&index) => {
                    let candidate = &mut candidates[index];
                    if (rank.kind, rank.key_len) < (candidate.best.kind, candidate.best.key_len) {
                        candidate.best = rank;
                        candidate.best_key = &entry.key;
                    }
                    candidate.members.push(entry);
                }
                None => {
                    by_name.insert((shard_pos, entry.display_name.as_str()), candidates.len());
                    candidates.push(Candidate {
                        shard_pos,
                        shard,
                        display_name: &entry.display_name,
                        best: rank,
                        best_key: &entry.key,
                        members: vec![entry],
                    });
                }
            }
        }
    }

    candidates.sort_by(Candidate::cmp_rank);
    if let Some(max) = max_results {
        candidates.truncate(max);
    }

    tracing::trace!("Query '{}' produced {} groups", query, candidates.len());

    candidates
        .into_iter()
        .map(|mut candidate| {
            candidate.members.sort_by_key(|entry| entry.ordinal);
            ResultGroup {
                display_name: candidate.display_name.to_string(),
                key: candidate.best_key.to_string(),
                shard: candidate.shard.clone(),
                match_kind: candidate.best.kind,
                occurrences: candidate
                    .members
                    .iter()
                    .flat_map(|entry| entry.occurrences.iter().cloned())
                    .collect(),
            }
        })
        .collect()
}
