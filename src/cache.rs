//! Flat-file article cache: one JSON file per content hash.
//!
//! This is the pipeline's only persistent state and its dedup mechanism.
//!
//! ```text
//! cache_dir/
//! ├── 0a1b...e9.json
//! └── 77fe...01.json
//! ```
//!
//! There is no locking. Callers must not write the same hash from two tasks
//! at once; the aggregator guarantees this by dispatching each hash once.
//! A write replaces the whole file, so a crash mid-write can leave a
//! truncated file. Such files fail to parse, are logged and skipped, and the
//! item is simply reprocessed on the next run.

use crate::error::Result;
use crate::models::{CachedArticle, ContentHash};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, hash: &ContentHash) -> PathBuf {
        self.dir.join(format!("{}.json", hash.as_str()))
    }

    #[allow(dead_code)]
    pub async fn exists(&self, hash: &ContentHash) -> bool {
        fs::try_exists(self.path_for(hash)).await.unwrap_or(false)
    }

    /// Read and parse one cache entry.
    ///
    /// # Errors
    ///
    /// I/O errors, or a JSON error for a corrupt or truncated file.
    pub async fn read(&self, hash: &ContentHash) -> Result<CachedArticle> {
        let raw = fs::read_to_string(self.path_for(hash)).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write one cache entry, replacing any existing file.
    #[instrument(level = "debug", skip_all, fields(hash = %hash))]
    pub async fn write(&self, hash: &ContentHash, article: &CachedArticle) -> Result<()> {
        let json = serde_json::to_string_pretty(article)?;
        fs::write(self.path_for(hash), json).await?;
        debug!("Wrote cache entry");
        Ok(())
    }

    /// Load every parseable entry.
    ///
    /// Non-`.json` files are ignored. Corrupt files, and files whose stem
    /// does not match the stored hash, are logged and skipped. A missing
    /// directory yields an empty list.
    #[instrument(level = "info", skip_all, fields(dir = %self.dir.display()))]
    pub async fn load_all(&self) -> Vec<CachedArticle> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(rd) => rd,
            Err(e) => {
                warn!(error = %e, "Cannot list cache directory; starting empty");
                return Vec::new();
            }
        };

        let mut articles = Vec::new();
        let mut seen = 0usize;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Error while listing cache directory");
                    break;
                }
            };
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            seen += 1;
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };

            match self.read(&ContentHash(stem.clone())).await {
                Ok(article) if article.content_hash.as_str() == stem => articles.push(article),
                Ok(article) => warn!(
                    file = %path.display(),
                    stored = %article.content_hash,
                    "Cache file name does not match its content hash; skipping"
                ),
                Err(e) => warn!(file = %path.display(), error = %e, "Failed to load cache file; skipping"),
            }
        }

        info!(files = seen, loaded = articles.len(), "Loaded cached articles");
        articles
    }

    /// Number of `.json` entries on disk.
    pub async fn count(&self) -> usize {
        let Ok(mut entries) = fs::read_dir(&self.dir).await else {
            return 0;
        };
        let mut n = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.path().extension().and_then(|e| e.to_str()) == Some("json") {
                n += 1;
            }
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use chrono::{TimeZone, Utc};

    fn published() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 3, 4, 5, 6).unwrap()
    }

    #[tokio::test]
    async fn test_write_read_exists() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CacheStore::new(tmp.path());
        let article = fixtures::article("aaa111", published(), 7);

        assert!(!store.exists(&article.content_hash).await);
        store.write(&article.content_hash, &article).await.unwrap();
        assert!(store.exists(&article.content_hash).await);
        assert!(tmp.path().join("aaa111.json").is_file());

        let back = store.read(&article.content_hash).await.unwrap();
        assert_eq!(back, article);
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_write_replaces_whole_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CacheStore::new(tmp.path());
        let mut article = fixtures::article("bbb222", published(), 1);
        store.write(&article.content_hash, &article).await.unwrap();

        article.speedrun = "short".to_string();
        store.write(&article.content_hash, &article).await.unwrap();
        let back = store.read(&article.content_hash).await.unwrap();
        assert_eq!(back.speedrun, "short");
    }

    #[tokio::test]
    async fn test_load_all_skips_corrupt_and_foreign_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CacheStore::new(tmp.path());
        let good = fixtures::article("ccc333", published(), 1);
        store.write(&good.content_hash, &good).await.unwrap();

        std::fs::write(tmp.path().join("ddd444.json"), "{\"content_hash\": \"ddd4").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "hello").unwrap();
        let renamed = fixtures::article("eee555", published(), 1);
        std::fs::write(
            tmp.path().join("fff666.json"),
            serde_json::to_string(&renamed).unwrap(),
        )
        .unwrap();

        let loaded = store.load_all().await;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].content_hash, good.content_hash);
    }

    #[tokio::test]
    async fn test_load_all_missing_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CacheStore::new(tmp.path().join("nope"));
        assert!(store.load_all().await.is_empty());
        assert_eq!(store.count().await, 0);
    }
}
