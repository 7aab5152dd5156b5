//! Shard cache status report.

use crate::session::{SearchSession, SessionState};
use std::fmt::Write as _;

/// Describe the session state and the shard cache.
pub async fn handle_shard_status(session: &SearchSession) -> String {
    let stats = session.store().stats().await;
    let cached = session.store().cached_ids().await;

    let mut output = String::from("Shard cache:\n");
    let _ = writeln!(output, "  • cached: {}", stats.cached);
    let _ = writeln!(output, "  • loading: {}", stats.in_flight);
    let _ = writeln!(
        output,
        "  • loads: {} ({} failed), cache hits: {}",
        stats.loads, stats.failures, stats.hits
    );

    if !cached.is_empty() {
        let ids: Vec<String> = cached.iter().map(ToString::to_string).collect();
        let _ = writeln!(output, "  • shards: {}", ids.join(", "));
    }

    let categories = session.categories();
    let filter = if categories.is_empty() {
        "all".to_string()
    } else {
        categories.join(", ")
    };
    let _ = writeln!(output, "\nCategories searched: {}", filter);

    let state = match session.state() {
        SessionState::Idle => "idle".to_string(),
        SessionState::Pending(id) => format!("query {} pending", id),
        SessionState::Settled(id, results) => format!(
            "query {} '{}' settled with {} symbol(s)",
            id,
            results.query,
            results.groups.len()
        ),
    };
    let _ = writeln!(output, "Session: {}", state);

    output
}
