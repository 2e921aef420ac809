//! Content hashing for deduplication.
//!
//! The hash is the only dedup key in the system: two items that agree on
//! title (case and surrounding whitespace ignored), source name, publish
//! timestamp and body collapse to one cache entry, even if their URLs
//! differ. Collisions are treated as "same article".
//!
//! Entries without a feed date hash with an empty timestamp, so the fetch
//! time standing in for their date never changes their identity.

use crate::models::ContentHash;
use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

/// Render a publish timestamp the way it enters the hash.
pub fn canonical_timestamp(published_at: &DateTime<Utc>) -> String {
    published_at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Compute the content hash of a feed item.
///
/// # Arguments
///
/// * `title` - Item title; trimmed and lowercased before hashing
/// * `source` - Source display name
/// * `published_at` - Publish timestamp as given by the feed, if any
/// * `body` - Body text, hashed verbatim
///
/// # Returns
///
/// A 64-character lowercase hex SHA-256 digest.
pub fn content_hash(
    title: &str,
    source: &str,
    published_at: Option<&DateTime<Utc>>,
    body: &str,
) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(title.trim().to_lowercase().as_bytes());
    hasher.update(b"||");
    hasher.update(source.as_bytes());
    hasher.update(b"||");
    if let Some(ts) = published_at {
        hasher.update(canonical_timestamp(ts).as_bytes());
    }
    hasher.update(b"||");
    hasher.update(body.as_bytes());
    ContentHash(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 6, 14, 30, 0).unwrap()
    }

    #[test]
    fn test_hash_is_deterministic_and_hex() {
        let a = content_hash("GPT-5 System Card", "OpenAI", Some(&ts()), "Body text");
        let b = content_hash("GPT-5 System Card", "OpenAI", Some(&ts()), "Body text");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_title_is_normalized() {
        let a = content_hash("  GPT-5 System Card ", "OpenAI", Some(&ts()), "Body");
        let b = content_hash("gpt-5 system card", "OpenAI", Some(&ts()), "Body");
        assert_eq!(a, b);
    }

    #[test]
    fn test_body_is_not_normalized() {
        let a = content_hash("Title", "OpenAI", Some(&ts()), "Body");
        let b = content_hash("Title", "OpenAI", Some(&ts()), "body");
        let c = content_hash("Title", "OpenAI", Some(&ts()), "Body ");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_every_field_changes_hash() {
        let base = content_hash("Title", "OpenAI", Some(&ts()), "Body");
        let later = ts() + chrono::Duration::milliseconds(1);
        assert_ne!(base, content_hash("Title 2", "OpenAI", Some(&ts()), "Body"));
        assert_ne!(base, content_hash("Title", "Google DeepMind", Some(&ts()), "Body"));
        assert_ne!(base, content_hash("Title", "OpenAI", Some(&later), "Body"));
        assert_ne!(base, content_hash("Title", "OpenAI", Some(&ts()), "Body 2"));
    }

    #[test]
    fn test_undated_entries_ignore_stand_in_time() {
        let a = content_hash("Title", "OpenAI", None, "Body");
        let b = content_hash("Title", "OpenAI", None, "Body");
        assert_eq!(a, b);
        assert_ne!(a, content_hash("Title", "OpenAI", Some(&ts()), "Body"));
    }

    #[test]
    fn test_canonical_timestamp_format() {
        assert_eq!(canonical_timestamp(&ts()), "2025-05-06T14:30:00.000Z");
    }
}
