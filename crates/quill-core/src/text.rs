//! Text utilities: UTF-8-safe truncation, content hashing, word counts.
//!
//! Rust `&str[..n]` panics when `n` falls inside a multi-byte character, so
//! truncation here always snaps to the nearest char boundary. Hashes are
//! SHA-256 of the committed text, hex-encoded; they are identity keys for
//! chunk freshness, never security material.

use std::fmt::Write as _;

use sha2::{Digest, Sha256};

/// Truncate a string to at most `max_bytes` bytes at a char boundary.
///
/// Returns the longest prefix of `s` whose byte length is ≤ `max_bytes` and
/// that does not split a multi-byte character.
#[inline]
#[must_use]
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Truncate `s` and append `suffix` if the original exceeds `max_bytes`.
///
/// The returned string is at most `max_bytes` bytes long including the
/// suffix. If the string already fits it is returned unchanged.
#[must_use]
pub fn truncate_with_suffix(s: &str, max_bytes: usize, suffix: &str) -> String {
    if s.len() <= max_bytes {
        return s.to_owned();
    }
    let body_budget = max_bytes.saturating_sub(suffix.len());
    let prefix = truncate_str(s, body_budget);
    format!("{prefix}{suffix}")
}

/// SHA-256 of `text`, lowercase hex.
#[must_use]
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Whitespace-delimited word count.
#[must_use]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
