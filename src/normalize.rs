//! Search token normalization.
//!
//! Shard keys are lowercase identifiers in which every ASCII character other
//! than `[a-z0-9]` is written as `_` followed by its two-digit hex code
//! (`operator+` becomes `operator_2b`, `set_x` becomes `set_5fx`). Queries go
//! through the same transform so they can be compared against keys directly.

use std::borrow::Cow;

/// Normalize a user query into key space: trim, lowercase, escape.
///
/// Returns an empty string for empty or whitespace-only input.
pub fn normalize_query(raw: &str) -> String {
    escape_identifier(&raw.trim().to_lowercase())
}

/// Escape a lowercase string into key space.
///
/// Non-ASCII characters pass through unchanged.
pub fn escape_identifier(lower: &str) -> String {
    let mut out = String::with_capacity(lower.len());
    for c in lower.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || !c.is_ascii() {
            out.push(c);
        } else {
            out.push_str(&format!("_{:02x}", u32::from(c)));
        }
    }
    out
}

/// Reverse [`escape_identifier`], turning `_xx` hex escapes back into characters.
///
/// A `_` not followed by two hex digits is kept as-is.
pub fn decode_key(key: &str) -> Cow<'_, str> {
    if !key.contains('_') {
        return Cow::Borrowed(key);
    }

    let mut out = String::with_capacity(key.len());
    let mut rest = key;
    while let Some(pos) = rest.find('_') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];
        let decoded = tail
            .get(..2)
            .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            .filter(u8::is_ascii);

        if let Some(byte) = decoded {
            out.push(char::from(byte));
            rest = &tail[2..];
        } else {
            out.push('_');
            rest = tail;
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Whether `key` is a plausible normalized form of `display_name`.
///
/// Case-insensitive containment in either direction, after undoing the
/// identifier escapes in `key`.
pub fn key_matches_display(key: &str, display_name: &str) -> bool {
    let lower = display_name.to_lowercase();
    let decoded = decode_key(key);
    lower.contains(decoded.as_ref())
        || decoded.contains(lower.as_str())
        || escape_identifier(&lower).contains(key)
}
