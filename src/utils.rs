//! Utility functions for text cleanup, model-response handling, and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - String truncation for logging
//! - Markdown fence stripping and JSON extraction for LLM responses
//! - JSON error detection for handling LLM response truncation
//! - Share identifiers for articles
//! - File system validation for output directories

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

use crate::error::Result;
use crate::models::ContentHash;

static OPEN_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```[A-Za-z0-9_-]*\s*").unwrap());
static CLOSE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*```\s*$").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a char boundary) with an
/// ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// When the LLM response is cut off (e.g., due to token limits), the
/// resulting JSON will fail to parse with an EOF error.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// Remove a surrounding markdown code fence (```` ```json ... ``` ````) if present.
pub fn strip_code_fences(s: &str) -> String {
    let trimmed = s.trim();
    let without_open = OPEN_FENCE.replace(trimmed, "");
    CLOSE_FENCE.replace(&without_open, "").trim().to_string()
}

/// Cut a response down to its outermost `{ ... }` span.
///
/// Returns the input unchanged when no braces are found.
pub fn extract_json_object(s: &str) -> &str {
    match (s.find('{'), s.rfind('}')) {
        (Some(start), Some(end)) if start < end => &s[start..=end],
        _ => s,
    }
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s, " ").trim().to_string()
}

/// Take the first `max` characters of a string.
pub fn take_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Build a short, shareable identifier for an article.
///
/// Takes the initials of the first three words longer than two characters
/// and appends the first three characters of the content hash. Titles with
/// fewer than two such words use their first five ASCII letters instead.
///
/// # Examples
///
/// ```ignore
/// // "GPT-5 System Card" -> "gsc" + hash prefix
/// ```
pub fn share_id(title: &str, hash: &ContentHash) -> String {
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();
    let words: Vec<&str> = cleaned.split_whitespace().filter(|w| w.len() > 2).collect();

    let stem: String = if words.len() >= 2 {
        words.iter().take(3).filter_map(|w| w.chars().next()).collect()
    } else {
        title
            .to_lowercase()
            .chars()
            .take(5)
            .filter(|c| c.is_ascii_lowercase())
            .collect()
    };
    let suffix: String = hash.as_str().chars().take(3).collect();
    format!("{stem}{suffix}")
}

/// Ensure a directory exists and is writable.
///
/// This function creates the directory if it doesn't exist, then performs
/// a write test by creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    fs::write(&probe_path, b"").await?;
    let _ = fs::remove_file(&probe_path).await;
    info!("Directory is writable");
    Ok(())
}
