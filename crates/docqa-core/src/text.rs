//! Text cleanup applied to extracted page text before chunking, plus a small
//! snippet helper for displaying hits.

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

// Everything except word characters, whitespace and ,.!?;:()-'"
static DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[^\w\s,.!?;:()\-'"]+"#).expect("valid regex"));

/// Collapse whitespace, drop stray symbols and trim.
///
/// Unicode letters survive, so accented and non-Latin text is kept intact.
pub fn normalize(raw: &str) -> String {
    let collapsed = WHITESPACE_RUN.replace_all(raw, " ");
    let stripped = DISALLOWED.replace_all(&collapsed, "");
    stripped.trim().to_string()
}

/// Cut a display window of at most `max_len` characters out of `text`,
/// centred on the earliest query term when one occurs.
pub fn snippet(text: &str, query: &str, max_len: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_len {
        return text.to_string();
    }

    let lowered: Vec<char> = text.to_lowercase().chars().collect();
    let first_hit = query
        .to_lowercase()
        .split_whitespace()
        .filter_map(|term| find_chars(&lowered, term))
        .min();

    match first_hit {
        // Lowercasing can change the char count for a few scripts; clamp to the original.
        Some(pos) if pos < chars.len() => {
            let start = pos.saturating_sub(max_len / 2);
            let end = (start + max_len).min(chars.len());
            format!("...{}...", chars[start..end].iter().collect::<String>())
        }
        _ => format!("{}...", chars[..max_len].iter().collect::<String>()),
    }
}

fn find_chars(haystack: &[char], needle: &str) -> Option<usize> {
    let needle: Vec<char> = needle.chars().collect();
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle.as_slice())
}
