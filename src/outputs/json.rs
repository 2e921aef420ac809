//! The rolling "latest" window.
//!
//! Both `items.json` and `items-latest.json` carry the same payload: the
//! records published within the last `window_days`, in output order, plus
//! the size of the whole cache.

use crate::error::Result;
use crate::models::{ArticleRecord, FeedOutput};
use crate::outputs::write_pretty;
use chrono::{DateTime, Duration, Utc};
use std::path::Path;
use tracing::{info, instrument};

pub const ITEMS_FILE: &str = "items.json";
pub const ITEMS_LATEST_FILE: &str = "items-latest.json";

/// Select the window from records that are already sorted.
pub fn window<'a>(records: &'a [ArticleRecord], window_days: i64, now: DateTime<Utc>) -> Vec<&'a ArticleRecord> {
    let cutoff = now - Duration::days(window_days);
    records.iter().filter(|r| r.published_at >= cutoff).collect()
}

/// Write the window to both latest files.
///
/// # Arguments
///
/// * `output_dir` - Public data directory
/// * `records` - Every known record, already in output order
/// * `window_days` - Window length
/// * `now` - Reference time for the cutoff and `generated_at`
///
/// # Returns
///
/// The number of records in the window.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display(), window_days))]
pub async fn write_latest(
    output_dir: &Path,
    records: &[ArticleRecord],
    window_days: i64,
    now: DateTime<Utc>,
) -> Result<usize> {
    let articles = window(records, window_days, now);
    let output = FeedOutput {
        generated_at: now,
        total_articles: articles.len(),
        total_in_cache: records.len(),
        articles,
    };

    for name in [ITEMS_FILE, ITEMS_LATEST_FILE] {
        write_pretty(&output_dir.join(name), &output).await?;
    }
    info!(in_window = output.total_articles, total = records.len(), "Wrote latest window");
    Ok(output.total_articles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 31, 12, 0, 0).unwrap()
    }

    fn records() -> Vec<ArticleRecord> {
        vec![
            fixtures::article("new111", now() - Duration::days(1), 3).to_record(),
            fixtures::article("edge22", now() - Duration::days(30), 2).to_record(),
            fixtures::article("old333", now() - Duration::days(31), 1).to_record(),
        ]
    }

    #[test]
    fn test_window_cutoff_is_inclusive() {
        let recs = records();
        let ids: Vec<_> = window(&recs, 30, now()).iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["new111", "edge22"]);
    }

    #[tokio::test]
    async fn test_write_latest_writes_both_files() {
        let tmp = tempfile::tempdir().unwrap();
        let n = write_latest(tmp.path(), &records(), 30, now()).await.unwrap();
        assert_eq!(n, 2);

        let items = std::fs::read_to_string(tmp.path().join(ITEMS_FILE)).unwrap();
        let latest = std::fs::read_to_string(tmp.path().join(ITEMS_LATEST_FILE)).unwrap();
        assert_eq!(items, latest);

        let json: serde_json::Value = serde_json::from_str(&items).unwrap();
        assert_eq!(json["total_articles"], 2);
        assert_eq!(json["total_in_cache"], 3);
        assert_eq!(json["articles"][0]["id"], "new111");
        assert!(json["articles"][0].get("processing_order").is_none());
        assert!(json.get("generated_at").is_some());
    }

    #[tokio::test]
    async fn test_write_failure_propagates() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("does/not/exist");
        assert!(write_latest(&missing, &records(), 30, now()).await.is_err());
    }
}
