//! Month partitions and the metadata index.
//!
//! Records are grouped by the UTC calendar month of `published_at`. Each
//! group is written to `<Month>_<Year>_News.json`; `metadata.json` lists the
//! groups newest first so the front end can page through history.

use crate::error::Result;
use crate::models::{ArticleRecord, MetadataIndex, MonthFile, MonthIndexEntry};
use crate::outputs::write_pretty;
use chrono::{DateTime, Datelike, Utc};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, instrument};

pub const METADATA_FILE: &str = "metadata.json";

/// `(year, month)` key of a record.
fn month_key(ts: &DateTime<Utc>) -> (i32, u32) {
    (ts.year(), ts.month())
}

/// `"December_2024_News.json"`.
pub fn month_filename(year: i32, month: u32) -> String {
    format!("{}_{}_News.json", month_name(month), year)
}

fn month_name(month: u32) -> &'static str {
    const NAMES: [&str; 12] = [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ];
    NAMES[(month.clamp(1, 12) - 1) as usize]
}

/// Group sorted records by month, newest month first.
///
/// Order within each group is the input order.
pub fn partition(records: &[ArticleRecord]) -> Vec<((i32, u32), Vec<&ArticleRecord>)> {
    let mut months: BTreeMap<(i32, u32), Vec<&ArticleRecord>> = BTreeMap::new();
    for record in records {
        months.entry(month_key(&record.published_at)).or_default().push(record);
    }
    months.into_iter().rev().collect()
}

/// Write one file per month and then `metadata.json`.
///
/// # Arguments
///
/// * `output_dir` - Public data directory
/// * `records` - Every known record, already in output order
/// * `now` - Value for `generated_at`
///
/// # Returns
///
/// The metadata index that was written.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display()))]
pub async fn write_month_partitions(
    output_dir: &Path,
    records: &[ArticleRecord],
    now: DateTime<Utc>,
) -> Result<MetadataIndex> {
    let mut months = Vec::new();

    for ((year, month), articles) in partition(records) {
        let filename = month_filename(year, month);
        let file = MonthFile {
            month: format!("{} {}", month_name(month), year),
            year,
            total: articles.len(),
            generated_at: now,
            articles,
        };
        write_pretty(&output_dir.join(&filename), &file).await?;
        info!(file = %filename, count = file.total, "Wrote month partition");

        months.push(MonthIndexEntry {
            month: file.month,
            year,
            month_num: month,
            filename,
            article_count: file.total,
        });
    }

    let metadata = MetadataIndex {
        generated_at: now,
        total_articles: records.len(),
        total_months: months.len(),
        months,
    };
    write_pretty(&output_dir.join(METADATA_FILE), &metadata).await?;
    info!(months = metadata.total_months, total = metadata.total_articles, "Wrote metadata index");
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn records() -> Vec<ArticleRecord> {
        vec![
            fixtures::article("jan222", at(2025, 1, 2, 9), 4).to_record(),
            fixtures::article("jan111", at(2025, 1, 1, 0), 3).to_record(),
            fixtures::article("dec333", at(2024, 12, 31, 23), 2).to_record(),
            fixtures::article("nov444", at(2024, 11, 5, 8), 1).to_record(),
        ]
    }

    #[test]
    fn test_month_filename() {
        assert_eq!(month_filename(2024, 12), "December_2024_News.json");
        assert_eq!(month_filename(2025, 1), "January_2025_News.json");
    }

    #[test]
    fn test_partition_uses_utc_months_newest_first() {
        let recs = records();
        let parts = partition(&recs);
        let keys: Vec<_> = parts.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![(2025, 1), (2024, 12), (2024, 11)]);
        assert_eq!(parts[0].1.len(), 2);
        assert_eq!(parts[0].1[0].id.as_str(), "jan222");
    }

    #[tokio::test]
    async fn test_writes_month_files_and_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let now = at(2025, 1, 3, 0);
        let metadata = write_month_partitions(tmp.path(), &records(), now).await.unwrap();

        assert_eq!(metadata.total_articles, 4);
        assert_eq!(metadata.total_months, 3);
        assert_eq!(metadata.months[0].filename, "January_2025_News.json");
        assert_eq!(metadata.months[0].month, "January 2025");
        assert_eq!(metadata.months[0].month_num, 1);
        assert_eq!(metadata.months[2].month_num, 11);

        let dec: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(tmp.path().join("December_2024_News.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(dec["month"], "December 2024");
        assert_eq!(dec["year"], 2024);
        assert_eq!(dec["total"], 1);
        assert_eq!(dec["articles"][0]["id"], "dec333");

        let meta: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(tmp.path().join(METADATA_FILE)).unwrap()).unwrap();
        assert_eq!(meta["months"].as_array().unwrap().len(), 3);
        assert_eq!(meta["months"][1]["article_count"], 1);
    }

    #[tokio::test]
    async fn test_empty_cache_writes_empty_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let metadata = write_month_partitions(tmp.path(), &[], at(2025, 1, 1, 0)).await.unwrap();
        assert_eq!(metadata.total_months, 0);
        assert!(tmp.path().join(METADATA_FILE).is_file());
    }
}
