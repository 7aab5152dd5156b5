//! Warm the shard cache ahead of queries.

use crate::session::SearchSession;
use rmcp::schemars;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct PreloadRequest {
    /// Categories to load (default: the categories currently searched)
    #[serde(default)]
    pub categories: Option<Vec<String>>,
}

/// Load every shard of the requested categories and report the outcome.
pub async fn handle_preload(
    session: &SearchSession,
    request: PreloadRequest,
) -> Result<String, String> {
    let router = session.router();
    let categories = match request.categories {
        Some(categories) => {
            if let Some(unknown) = categories.iter().find(|name| !router.has_category(name)) {
                return Err(format!("Unknown category '{}'", unknown));
            }
            categories
        }
        None => session.categories(),
    };

    let shards = router.all_shards(&categories);
    if shards.is_empty() {
        return Ok("No shards to load.".to_string());
    }

    let store = session.store();
    store.preload(&shards).await;

    let mut loaded = 0;
    let mut failed = Vec::new();
    for shard in &shards {
        if store.is_cached(shard).await {
            loaded += 1;
        } else {
            failed.push(shard.to_string());
        }
    }

    tracing::info!("Preloaded {}/{} shard(s)", loaded, shards.len());
    let mut output = format!("Loaded {} of {} shard(s).", loaded, shards.len());
    if !failed.is_empty() {
        output.push_str(&format!("\nUnavailable: {}", failed.join(", ")));
    }
    Ok(output)
}
