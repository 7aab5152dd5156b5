//! Mapping from a query to the shards that may contain its matches.
//!
//! Each category is partitioned by the leading character of its keys. The
//! generator writes one shard per character that has content, numbered in the
//! order the characters are listed for that category, so `f` at position 5 of
//! the `functions` sections lives in `functions_5`.

use crate::config::CategoryConfig;
use crate::shard::ShardId;

/// Leading characters with content for one category, in partition order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySections {
    pub name: String,
    pub sections: Vec<char>,
}

/// Routes queries to shard ids. Pure configuration, no I/O.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardRouter {
    categories: Vec<CategorySections>,
}

impl ShardRouter {
    pub const fn new(categories: Vec<CategorySections>) -> Self {
        Self { categories }
    }

    pub fn from_config(categories: &[CategoryConfig]) -> Self {
        Self::new(
            categories
                .iter()
                .map(|category| CategorySections {
                    name: category.name.clone(),
                    sections: category.sections.chars().collect(),
                })
                .collect(),
        )
    }

    /// Names of all configured categories, in configuration order.
    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    pub fn has_category(&self, name: &str) -> bool {
        self.categories.iter().any(|c| c.name == name)
    }

    /// Shards to search for `query` within the `active` categories.
    ///
    /// An empty `active` list means every configured category. Returns nothing
    /// for an empty query or a leading character no shard covers.
    pub fn route(&self, query: &str, active: &[String]) -> Vec<ShardId> {
        let Some(first) = query.trim().to_lowercase().chars().next() else {
            return vec![];
        };

        self.active(active)
            .filter_map(|category| {
                let position = category.sections.iter().position(|&c| c == first)?;
                let partition = u32::try_from(position).ok()?;
                Some(ShardId::new(category.name.clone(), partition))
            })
            .collect()
    }

    /// Every shard of the `active` categories.
    pub fn all_shards(&self, active: &[String]) -> Vec<ShardId> {
        self.active(active)
            .flat_map(|category| {
                (0..category.sections.len())
                    .filter_map(|position| u32::try_from(position).ok())
                    .map(|partition| ShardId::new(category.name.clone(), partition))
            })
            .collect()
    }

    fn active<'a>(&'a self, active: &'a [String]) -> impl Iterator<Item = &'a CategorySections> {
        self.categories
            .iter()
            .filter(move |category| active.is_empty() || active.contains(&category.name))
    }
}
