//! Validation of the shard value tree into typed entries, and the reverse
//! rendering used for round-trips.

use super::literal::read_script;
use super::{Entry, Occurrence, ShardId};
use crate::error::ShardError;
use crate::normalize::key_matches_display;
use ahash::AHashSet;
use serde_json::Value;
use std::fmt::Write as _;

/// Parse a shard script into entries sorted by key.
pub(super) fn parse_entries(id: &ShardId, raw: &str) -> Result<Vec<Entry>, ShardError> {
    let root = read_script(raw).map_err(|e| ShardError::malformed(id, e.to_string()))?;
    let Value::Array(elements) = root else {
        return Err(ShardError::malformed(id, "top-level value is not an array"));
    };

    let mut seen = AHashSet::with_capacity(elements.len());
    let mut entries = Vec::with_capacity(elements.len());

    for (ordinal, element) in elements.iter().enumerate() {
        let entry = parse_entry(id, ordinal, element)?;
        if !seen.insert(entry.key.clone()) {
            return Err(ShardError::DuplicateKey {
                shard: id.clone(),
                key: entry.key,
            });
        }
        entries.push(entry);
    }

    entries.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(entries)
}

/// `[key, [displayName, occurrences...]]`
fn parse_entry(id: &ShardId, ordinal: usize, element: &Value) -> Result<Entry, ShardError> {
    let malformed =
        |reason: &str| ShardError::malformed(id, format!("entry {}: {}", ordinal, reason));

    let Some([key, body]) = element.as_array().map(Vec::as_slice) else {
        return Err(malformed("expected a [key, [name, occurrences]] pair"));
    };
    let key = key.as_str().ok_or_else(|| malformed("key is not a string"))?;
    if key.is_empty() || key.trim() != key || key.to_lowercase() != key {
        return Err(malformed(&format!("key '{}' is not normalized", key)));
    }

    let body = body
        .as_array()
        .ok_or_else(|| malformed("entry body is not an array"))?;
    let Some((display_name, rest)) = body.split_first() else {
        return Err(malformed("entry body is empty"));
    };
    let display_name = display_name
        .as_str()
        .ok_or_else(|| malformed("display name is not a string"))?;

    if !key_matches_display(key, display_name) {
        return Err(malformed(&format!(
            "key '{}' does not match display name '{}'",
            key, display_name
        )));
    }

    let tuples: &[Value] = match rest {
        // [name, [[url, flag, label], ...]]
        [Value::Array(list)] if list.first().is_some_and(Value::is_array) => list,
        // [name, [url, flag, label]] or [name, [url, flag, label], [url, flag, label], ...]
        _ => rest,
    };
    if tuples.is_empty() {
        return Err(malformed("entry has no occurrences"));
    }

    let occurrences = tuples
        .iter()
        .map(|tuple| parse_occurrence(tuple).map_err(|reason| malformed(reason)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Entry {
        key: key.to_string(),
        display_name: display_name.to_string(),
        occurrences,
        ordinal,
    })
}

/// `[anchorURL, targetFlag, scopeLabel]`
fn parse_occurrence(tuple: &Value) -> Result<Occurrence, &'static str> {
    let Some([url, flag, label]) = tuple.as_array().map(Vec::as_slice) else {
        return Err("occurrence is not a 3-tuple");
    };
    let anchor_url = url.as_str().ok_or("anchor URL is not a string")?;
    let opens_in_parent = match flag {
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::Bool(b) => *b,
        _ => return Err("target flag is not a number"),
    };
    let label = label.as_str().ok_or("scope label is not a string")?;
    let (scope_label, signature_hint) = split_signature(label);

    Ok(Occurrence {
        scope_label,
        anchor_url: anchor_url.to_string(),
        signature_hint,
        opens_in_parent,
    })
}

/// Split a trailing parenthesized parameter list off a scope label.
///
/// `Sifteo::BG0Drawable::fill(UInt2 topLeft)` becomes
/// `("Sifteo::BG0Drawable::fill", Some("(UInt2 topLeft)"))`. Labels without a
/// balanced trailing list are returned whole.
pub fn split_signature(label: &str) -> (String, Option<String>) {
    if !label.ends_with(')') {
        return (label.to_string(), None);
    }

    let mut depth = 0usize;
    for (index, byte) in label.bytes().enumerate().rev() {
        match byte {
            b')' => depth += 1,
            b'(' => {
                depth -= 1;
                if depth == 0 {
                    if index == 0 {
                        break;
                    }
                    return (label[..index].to_string(), Some(label[index..].to_string()));
                }
            }
            _ => {}
        }
    }
    (label.to_string(), None)
}

/// Render entries in file order in the canonical script shape.
pub(super) fn render_entries(entries: &[Entry]) -> String {
    let mut ordered: Vec<&Entry> = entries.iter().collect();
    ordered.sort_by_key(|entry| entry.ordinal);

    let mut out = String::from("var searchData=\n[\n");
    for (i, entry) in ordered.iter().enumerate() {
        let _ = write!(
            out,
            "  [{},[{}",
            quote(&entry.key),
            quote(&entry.display_name)
        );
        for occurrence in &entry.occurrences {
            let _ = write!(
                out,
                ",[{},{},{}]",
                quote(&occurrence.anchor_url),
                u8::from(occurrence.opens_in_parent),
                quote(&occurrence.qualified_label())
            );
        }
        out.push_str("]]");
        if i + 1 < ordered.len() {
            out.push(',');
        }
        out.push('\n');
    }
    out.push_str("];\n");
    out
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}
