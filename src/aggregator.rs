//! The ingestion run: cache → feeds → processing → public artifacts.
//!
//! # Phases
//!
//! 1. **Setup**: make sure the cache and output directories are writable;
//!    this is the only fatal step
//! 2. **Load**: read every cache entry and build the set of known hashes
//! 3. **Refresh** (opt-in): re-summarize entries from an older prompt version
//! 4. **Ingest**: per source, fetch, hash, skip known entries, and process the
//!    rest (classify, summarize, score, cache) with bounded concurrency
//! 5. **Publish**: sort, write month partitions and the latest window
//!
//! Failures are contained at the smallest scope: a dead feed skips one
//! source, a failed model call drops one item. Neither fails the run.

use crate::api::AskAsync;
use crate::cache::CacheStore;
use crate::classifier::classify;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::feeds::FeedFetcher;
use crate::hasher::content_hash;
use crate::hype;
use crate::models::{
    ArticleRecord, CachedArticle, Category, ContentHash, ModelMeta, RawFeedItem, SourceDescriptor, Summary,
};
use crate::outputs::{indexes, json};
use crate::summarizer::{PROMPT_VERSION, article_text, summarize};
use crate::utils::{ensure_writable_dir, share_id};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, error, info, instrument, warn};

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Entries read from the cache at start.
    pub loaded: usize,
    /// Entries processed and cached during this run.
    pub new_articles: usize,
    /// Entries dropped because processing failed.
    pub failed_items: usize,
    /// Ids of sources whose feed could not be fetched or parsed.
    pub failed_sources: Vec<String>,
    /// Stale entries refreshed with the current prompt.
    pub resummarized: usize,
    /// Records across all month partitions.
    pub total_in_cache: usize,
    /// Records in the latest window.
    pub in_window: usize,
    /// Month partitions written.
    pub months: usize,
}

/// One new entry queued for processing.
struct Job<'s> {
    source: &'s SourceDescriptor,
    item: RawFeedItem,
    hash: ContentHash,
    order: i64,
}

/// Hype over the title and the serialized summary.
fn hype_for(title: &str, source_name: &str, category: Category, summary: &Summary) -> u8 {
    let summary_text = serde_json::to_string(summary).unwrap_or_default();
    hype::score(title, source_name, category, &summary_text)
}

/// Output order: newest first, later processing first on ties.
pub fn output_order(a: &ArticleRecord, b: &ArticleRecord) -> Ordering {
    b.published_at
        .cmp(&a.published_at)
        .then_with(|| b.processing_order.cmp(&a.processing_order))
}

pub struct Aggregator<'a, L, F> {
    config: &'a PipelineConfig,
    llm: &'a L,
    fetcher: &'a F,
    cache: CacheStore,
}

impl<'a, L, F> Aggregator<'a, L, F>
where
    L: AskAsync,
    F: FeedFetcher,
{
    pub fn new(config: &'a PipelineConfig, llm: &'a L, fetcher: &'a F) -> Self {
        Self {
            config,
            llm,
            fetcher,
            cache: CacheStore::new(&config.cache_dir),
        }
    }

    /// Run one full ingestion pass.
    ///
    /// # Arguments
    ///
    /// * `now` - Reference time for the window, `generated_at` and the
    ///   processing-order base
    ///
    /// # Errors
    ///
    /// Only when a directory is unusable or an output file cannot be written.
    #[instrument(level = "info", skip_all, fields(sources = self.config.sources.len()))]
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunReport> {
        ensure_writable_dir(&self.config.cache_dir).await?;
        ensure_writable_dir(&self.config.output_dir).await?;

        let mut report = RunReport::default();
        let mut articles = self.cache.load_all().await;
        report.loaded = articles.len();
        debug!(cache_dir = %self.cache.dir().display(), loaded = report.loaded, "Cache loaded");

        if self.config.resummarize_stale {
            let (refreshed, count) = self.refresh_stale(articles).await;
            articles = refreshed;
            report.resummarized = count;
        }

        let mut known: HashSet<ContentHash> = articles.iter().map(|a| a.content_hash.clone()).collect();
        let run_start = now.timestamp_millis();
        let mut sequence = 0i64;

        for source in &self.config.sources {
            let items = match self.fetcher.fetch(source).await {
                Ok(items) => items,
                Err(e) => {
                    warn!(source = %source.id, error = %e, "Feed failed; skipping source");
                    report.failed_sources.push(source.id.clone());
                    continue;
                }
            };

            let mut jobs = Vec::new();
            for item in items.into_iter().take(self.config.items_per_source) {
                let published = item.dated.then_some(&item.published_at);
                let hash = content_hash(&item.title, &source.name, published, &item.body);
                if !known.insert(hash.clone()) {
                    debug!(source = %source.id, %hash, "Already known; skipping");
                    continue;
                }
                jobs.push(Job {
                    source,
                    item,
                    hash,
                    order: run_start + sequence,
                });
                sequence += 1;
            }
            info!(source = %source.id, new = jobs.len(), "Queued new entries");

            let results: Vec<Option<CachedArticle>> = stream::iter(jobs)
                .map(|job| self.process_job(job))
                .buffer_unordered(self.config.concurrency)
                .collect()
                .await;

            for result in results {
                match result {
                    Some(article) => {
                        report.new_articles += 1;
                        articles.push(article);
                    }
                    None => report.failed_items += 1,
                }
            }
        }

        let records: Vec<ArticleRecord> = articles
            .iter()
            .map(CachedArticle::to_record)
            .sorted_by(output_order)
            .collect();
        report.total_in_cache = records.len();

        let metadata = indexes::write_month_partitions(&self.config.output_dir, &records, now).await?;
        report.months = metadata.total_months;
        report.in_window = json::write_latest(&self.config.output_dir, &records, self.config.window_days, now).await?;

        info!(
            loaded = report.loaded,
            new = report.new_articles,
            failed_items = report.failed_items,
            failed_sources = report.failed_sources.len(),
            total = report.total_in_cache,
            in_window = report.in_window,
            "Run complete"
        );
        Ok(report)
    }

    /// Classify, summarize, score and cache one entry.
    ///
    /// Returns `None` (after logging) when the entry has to be dropped.
    #[instrument(level = "info", skip_all, fields(source = %job.source.id, hash = %job.hash))]
    async fn process_job(&self, job: Job<'_>) -> Option<CachedArticle> {
        let Job {
            source,
            item,
            hash,
            order,
        } = job;

        let decision = classify(self.llm, source, &item.title, &item.excerpt).await;

        let summary = match summarize(self.llm, &article_text(&item.title, &item.excerpt, &item.body)).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, title = %item.title, "Summarization failed; dropping item");
                return None;
            }
        };
        let hype_meter = hype_for(&item.title, &source.name, decision.category, &summary);

        let now = Utc::now();
        let article = CachedArticle {
            share_id: Some(share_id(&item.title, &hash)),
            content_hash: hash,
            title: item.title,
            headline: summary.headline,
            url: item.link,
            source: source.name.clone(),
            published_at: item.published_at,
            raw_excerpt: item.excerpt,
            raw_body: item.body,
            category: decision.category,
            category_confidence: decision.confidence,
            speedrun: summary.speedrun,
            why_it_matters: summary.why_it_matters,
            lenses: summary.lenses,
            hype_meter,
            model_meta: self.model_meta(),
            created_at: now,
            updated_at: now,
            processing_order: order,
        };

        if let Err(e) = self.cache.write(&article.content_hash, &article).await {
            error!(error = %e, "Cache write failed; dropping item");
            return None;
        }
        info!(category = %article.category, hype = article.hype_meter, "Processed article");
        Some(article)
    }

    fn model_meta(&self) -> ModelMeta {
        ModelMeta {
            model: self.config.model.clone(),
            prompt_version: PROMPT_VERSION.to_string(),
        }
    }

    /// Re-summarize entries produced by an older prompt version.
    ///
    /// Hash, creation time, category and processing order are kept. An entry
    /// whose refresh fails is kept unchanged.
    #[instrument(level = "info", skip_all)]
    async fn refresh_stale(&self, articles: Vec<CachedArticle>) -> (Vec<CachedArticle>, usize) {
        let (stale, mut current): (Vec<_>, Vec<_>) = articles
            .into_iter()
            .partition(|a| a.model_meta.prompt_version != PROMPT_VERSION);
        info!(stale = stale.len(), prompt_version = PROMPT_VERSION, "Refreshing stale entries");

        let refreshed: Vec<(CachedArticle, bool)> = stream::iter(stale)
            .map(|article| self.refresh_one(article))
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;

        let mut count = 0;
        for (article, updated) in refreshed {
            count += usize::from(updated);
            current.push(article);
        }
        (current, count)
    }

    #[instrument(level = "info", skip_all, fields(hash = %article.content_hash))]
    async fn refresh_one(&self, article: CachedArticle) -> (CachedArticle, bool) {
        let text = article_text(&article.title, &article.raw_excerpt, &article.raw_body);
        let summary = match summarize(self.llm, &text).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "Re-summarization failed; keeping cached summary");
                return (article, false);
            }
        };

        let mut updated = CachedArticle {
            hype_meter: hype_for(&article.title, &article.source, article.category, &summary),
            share_id: article
                .share_id
                .clone()
                .or_else(|| Some(share_id(&article.title, &article.content_hash))),
            headline: summary.headline,
            speedrun: summary.speedrun,
            why_it_matters: summary.why_it_matters,
            lenses: summary.lenses,
            model_meta: self.model_meta(),
            updated_at: Utc::now(),
            ..article
        };
        if updated.updated_at < updated.created_at {
            updated.updated_at = updated.created_at;
        }

        match self.cache.write(&updated.content_hash, &updated).await {
            Ok(()) => (updated, true),
            Err(e) => {
                error!(error = %e, "Cache write failed during refresh");
                (updated, false)
            }
        }
    }
}
