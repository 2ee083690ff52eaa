//! Hashtag canonicalization and extraction

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

const HASHTAG_PATTERN: &str = r"#([A-Za-z0-9_]{2,32})";
const CANONICAL_PATTERN: &str = r"^#[a-z0-9_]{2,32}$";

fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn hashtag_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&RE, HASHTAG_PATTERN)
}

fn canonical_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&RE, CANONICAL_PATTERN)
}

/// Trim, prefix `#` when missing, lowercase
pub fn canonicalize_tag(raw: &str) -> String {
    let trimmed = raw.trim();
    let prefixed = if trimmed.starts_with('#') {
        trimmed.to_string()
    } else {
        format!("#{}", trimmed)
    };
    prefixed.to_lowercase()
}

/// Whether a canonical tag could ever be produced by `extract_tags`
pub fn is_matchable_tag(canonical: &str) -> bool {
    canonical_regex()
        .map(|re| re.is_match(canonical))
        .unwrap_or(false)
}

/// Distinct canonical hashtags appearing in `text`
pub fn extract_tags(text: &str) -> HashSet<String> {
    let Some(re) = hashtag_regex() else {
        return HashSet::new();
    };
    re.find_iter(text)
        .map(|m| canonicalize_tag(m.as_str()))
        .collect()
}
