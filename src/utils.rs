//! Utility functions
//!
//! Text helpers shared by the router, the policies and the support catalog.

use lazy_regex::lazy_regex;
use sha2::{Digest, Sha256};

static RE_CODE_FENCE: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"(?s)^```[A-Za-z0-9_-]*\s*\n?(.*?)\s*```$");

/// Length of the hex prefix used when logging query hashes.
pub const QUERY_HASH_LEN: usize = 12;

/// Truncates a string to at most `max_chars` characters (Unicode-safe).
///
/// # Examples
///
/// ```
/// use support_router::utils::truncate_str;
///
/// assert_eq!(truncate_str("Привет, мир!", 6), "Привет");
/// assert_eq!(truncate_str("short", 10), "short");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Short, stable fingerprint of a query for log correlation.
///
/// Queries are never logged verbatim; the first [`QUERY_HASH_LEN`] hex
/// characters of their SHA-256 digest are logged instead.
#[must_use]
pub fn query_hash(query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    truncate_str(digest, QUERY_HASH_LEN)
}

/// Removes a surrounding markdown code fence (```` ```json ... ``` ````) if present.
///
/// Models frequently wrap JSON answers in fences even when told not to.
#[must_use]
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    RE_CODE_FENCE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map_or(trimmed, |m| m.as_str().trim())
}

/// Normalizes text for phrase matching.
///
/// Lowercases, keeps alphanumerics, apostrophes and hyphens, turns everything
/// else into single spaces and pads the result with a space on both sides so
/// that phrases can be matched on word boundaries with a plain `contains`.
#[must_use]
pub fn normalize_for_match(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push(' ');
    let mut last_was_space = true;
    for ch in text.chars() {
        let ch = if ch == '\u{2019}' { '\'' } else { ch };
        if ch.is_alphanumeric() || ch == '\'' || ch == '-' {
            out.extend(ch.to_lowercase());
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    if !last_was_space {
        out.push(' ');
    }
    out
}

/// Checks whether `phrase` occurs in already-normalized text on word boundaries.
#[must_use]
pub fn contains_phrase(normalized: &str, phrase: &str) -> bool {
    let needle = normalize_for_match(phrase);
    if needle.trim().is_empty() {
        return false;
    }
    normalized.contains(&needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str_unicode() {
        let s = "Привет, мир!";
        assert_eq!(truncate_str(s, 6), "Привет");
        assert_eq!(truncate_str(s, 100), s);
        assert_eq!(truncate_str("", 3), "");
    }

    #[test]
    fn query_hash_is_stable_and_short() {
        let first = query_hash("Check order ORD-001");
        let second = query_hash("Check order ORD-001");
        assert_eq!(first, second);
        assert_eq!(first.len(), QUERY_HASH_LEN);
        assert_ne!(first, query_hash("Check order ORD-002"));
    }

    #[test]
    fn strips_json_fence() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(raw), "{\"a\": 1}");
    }

    #[test]
    fn strips_bare_fence() {
        let raw = "  ```\n{\"a\": 1}```  ";
        assert_eq!(strip_code_fences(raw), "{\"a\": 1}");
    }

    #[test]
    fn leaves_unfenced_text_alone() {
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn normalizes_punctuation_and_case() {
        assert_eq!(
            normalize_for_match("My Headphones won’t pair!!"),
            " my headphones won't pair "
        );
    }

    #[test]
    fn phrase_matching_respects_word_boundaries() {
        let text = normalize_for_match("Where is my order? It's been pairing forever.");
        assert!(contains_phrase(&text, "my order"));
        assert!(contains_phrase(&text, "Where is"));
        assert!(!contains_phrase(&text, "pair"));
        assert!(!contains_phrase(&text, "  "));
    }
}
