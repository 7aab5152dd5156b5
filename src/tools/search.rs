//! Symbol search handler driving the live session.

use crate::engine::{MatchKind, ResultGroup};
use crate::session::{QueryId, ResultSet, SearchSession};
use rmcp::schemars;
use serde::Deserialize;
use std::borrow::Cow;
use std::fmt::Write as _;
use std::time::Duration;
use tokio::sync::watch;

/// Upper bound on waiting for a revision to settle.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchRequest {
    /// Start of a symbol name, or a fragment of it beginning with the name's first character
    pub query: String,
    /// Maximum number of symbols to show (default: 10)
    #[serde(default = "default_limit")]
    pub limit: Option<usize>,
    /// Restrict the search to these categories (e.g. "functions"); omit to keep the current filter
    #[serde(default)]
    pub categories: Option<Vec<String>>,
}

fn default_limit() -> Option<usize> {
    Some(10)
}

/// Run a query through the session and wait for its results.
pub async fn handle_search(
    session: &SearchSession,
    results: &mut watch::Receiver<Option<ResultSet>>,
    request: SearchRequest,
) -> Result<String, String> {
    if let Some(categories) = request.categories {
        if let Some(unknown) = categories
            .iter()
            .find(|name| !session.router().has_category(name))
        {
            let known: Vec<&str> = session.router().category_names().collect();
            return Err(format!(
                "Unknown category '{}'. Available categories: {}",
                unknown,
                known.join(", ")
            ));
        }
        if categories != session.categories() {
            // The query below runs under the new filter
            session.set_category_filter(categories);
        }
    }

    let id = session
        .on_input(&request.query)
        .ok_or_else(|| "Search session has been shut down".to_string())?;

    let settled = wait_for_settled(results, id).await?;
    let limit = request.limit.unwrap_or(10);

    if settled.groups.is_empty() {
        let mut msg = format!("No symbols found for '{}'.\n", request.query.trim());
        if request.query.trim().is_empty() {
            msg.push_str("\nType the start of a symbol name, e.g. 'fill' or 'Fix'.\n");
        }
        append_degraded_note(&mut msg, &settled);
        return Ok(msg);
    }

    Ok(format_results(&settled, limit))
}

/// Wait until a revision at or after `id` has been presented.
///
/// A newer revision from a concurrent caller supersedes ours; its results are
/// the latest ones and are returned instead.
async fn wait_for_settled(
    results: &mut watch::Receiver<Option<ResultSet>>,
    id: QueryId,
) -> Result<ResultSet, String> {
    let settled = tokio::time::timeout(
        SETTLE_TIMEOUT,
        results.wait_for(|r| r.as_ref().is_some_and(|r| r.query_id >= id)),
    )
    .await
    .map_err(|_| format!("Query {} did not settle within {:?}", id, SETTLE_TIMEOUT))?
    .map_err(|_| "Search session closed while waiting for results".to_string())?;

    settled
        .clone()
        .ok_or_else(|| "Search session produced no results".to_string())
}

/// Format grouped results into a readable string output.
fn format_results(results: &ResultSet, limit: usize) -> String {
    let total = results.groups.len();
    let shown = total.min(limit);

    let mut output = format!("Symbols matching '{}'", results.query.trim());
    if shown < total {
        let _ = write!(output, " (showing {} of {})", shown, total);
    }
    output.push_str(":\n\n");

    for (idx, group) in results.groups.iter().take(limit).enumerate() {
        format_group(&mut output, idx + 1, group);
        output.push('\n');
    }

    append_degraded_note(&mut output, results);
    output
}

fn format_group(output: &mut String, position: usize, group: &ResultGroup) {
    let kind = match group.match_kind {
        MatchKind::Exact => "exact",
        MatchKind::Prefix => "prefix",
        MatchKind::Substring => "contains",
    };
    let overloads = match group.occurrences.len() {
        1 => String::new(),
        n => format!(", {} locations", n),
    };
    let _ = writeln!(
        output,
        "{}. `{}` ({}{}) [{}]",
        position,
        decode_entities(&group.display_name),
        kind,
        overloads,
        group.shard
    );

    for occurrence in &group.occurrences {
        let label = occurrence.qualified_label();
        if label.is_empty() {
            let _ = writeln!(output, "   • {}", occurrence.anchor_url);
        } else {
            let _ = writeln!(
                output,
                "   • {} → {}",
                decode_entities(&label),
                occurrence.anchor_url
            );
        }
    }
}

fn append_degraded_note(output: &mut String, results: &ResultSet) {
    if !results.degraded {
        return;
    }
    let shards: Vec<String> = results
        .failed_shards
        .iter()
        .map(ToString::to_string)
        .collect();
    let _ = writeln!(
        output,
        "\nNote: partial results, could not load shard(s): {}",
        shards.join(", ")
    );
}

/// Decode the HTML entities the generator writes into labels.
fn decode_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&amp;", "&"),
    )
}
