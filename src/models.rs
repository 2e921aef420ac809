//! Data models for feed items, cached articles, and the public JSON artifacts.
//!
//! This module defines the core data structures used throughout the pipeline:
//! - [`SourceDescriptor`]: A configured feed source
//! - [`RawFeedItem`]: An entry as received from a feed, before processing
//! - [`CachedArticle`]: The durable, one-file-per-hash unit of state
//! - [`ArticleRecord`]: The public projection of a cached article
//! - [`FeedOutput`], [`MonthFile`], [`MetadataIndex`]: Public artifacts
//!
//! Field names are snake_case on disk because the web front end reads these
//! files directly.

use crate::utils::share_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A configured feed source.
///
/// The `domain` is used by the rule-based classifier and the hype scorer,
/// and never for fetching.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SourceDescriptor {
    /// Stable identifier, e.g. `"verge-ai"`.
    pub id: String,
    /// Display name; also part of the content hash.
    pub name: String,
    /// Feed URL (RSS 2.0 or Atom).
    pub rss: String,
    /// Publisher domain, e.g. `"theverge.com"`.
    pub domain: String,
}

impl SourceDescriptor {
    pub fn new(id: &str, name: &str, rss: &str, domain: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            rss: rss.to_string(),
            domain: domain.to_string(),
        }
    }
}

/// A feed entry as received from a source, after HTML stripping.
///
/// Lives only for one fetch cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFeedItem {
    pub title: String,
    pub link: String,
    /// Feed date, or the fetch time when the entry carried none.
    pub published_at: DateTime<Utc>,
    /// Whether `published_at` came from the feed itself.
    pub dated: bool,
    /// Lead paragraph: the first 400 characters of the content snippet.
    pub excerpt: String,
    /// Full content snippet, or the title when the entry carries no content.
    pub body: String,
}

/// Deduplication fingerprint of a feed item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ContentHash(pub String);

impl ContentHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The three editorial categories every article falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// What a model or system can do, and how it works.
    CapabilitiesAndHow,
    /// Deployments, launches and adoption in the real world.
    InActionRealWorld,
    /// Policy, labor, regulation, and where things are heading.
    TrendsRisksOutlook,
}

impl Category {
    pub const ALL: [Category; 3] = [
        Category::CapabilitiesAndHow,
        Category::InActionRealWorld,
        Category::TrendsRisksOutlook,
    ];

    /// Category used whenever classification cannot decide.
    pub const FALLBACK: Category = Category::CapabilitiesAndHow;

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::CapabilitiesAndHow => "capabilities_and_how",
            Category::InActionRealWorld => "in_action_real_world",
            Category::TrendsRisksOutlook => "trends_risks_outlook",
        }
    }

    /// Match a bare category identifier exactly (no trimming, no case folding).
    pub fn from_token(token: &str) -> Option<Category> {
        Self::ALL.into_iter().find(|c| c.as_str() == token)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the category was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Keyword/domain rules decided.
    High,
    /// The LLM tie-break returned a legal identifier.
    Medium,
    /// The tie-break failed and the fallback category was used.
    #[default]
    Low,
}

/// Result of running the classifier on one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryDecision {
    pub category: Category,
    pub confidence: Confidence,
}

/// The three audience-specific rewrites of a summary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Lenses {
    /// Plain-language explanation.
    pub eli12: String,
    /// Product-manager view.
    pub pm: String,
    /// Engineer view.
    pub engineer: String,
}

/// Structured digest returned by the summarizer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Summary {
    /// Optional plain rewrite of the original title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    pub speedrun: String,
    pub why_it_matters: Vec<String>,
    pub lenses: Lenses,
}

/// Which model and prompt produced a cached summary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ModelMeta {
    pub model: String,
    pub prompt_version: String,
}

fn default_hype_meter() -> u8 {
    3
}

/// The durable unit of state, one JSON file per content hash.
///
/// Includes the raw excerpt and body, which never reach the public output.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CachedArticle {
    pub content_hash: ContentHash,
    #[serde(default)]
    pub share_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub headline: Option<String>,
    pub url: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    pub raw_excerpt: String,
    pub raw_body: String,
    pub category: Category,
    #[serde(default)]
    pub category_confidence: Confidence,
    pub speedrun: String,
    pub why_it_matters: Vec<String>,
    pub lenses: Lenses,
    #[serde(default = "default_hype_meter")]
    pub hype_meter: u8,
    pub model_meta: ModelMeta,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub processing_order: i64,
}

impl CachedArticle {
    /// Trimmed-down public projection.
    ///
    /// Entries cached before share ids existed get one derived on the fly;
    /// the cache file itself is left alone.
    pub fn to_record(&self) -> ArticleRecord {
        ArticleRecord {
            id: self.content_hash.clone(),
            share_id: self
                .share_id
                .clone()
                .unwrap_or_else(|| share_id(&self.title, &self.content_hash)),
            category: self.category,
            title: self.title.clone(),
            headline: self.headline.clone(),
            source: self.source.clone(),
            url: self.url.clone(),
            published_at: self.published_at,
            speedrun: self.speedrun.clone(),
            why_it_matters: self.why_it_matters.clone(),
            lenses: self.lenses.clone(),
            hype_meter: self.hype_meter,
            processing_order: self.processing_order,
        }
    }
}

/// Public projection of a [`CachedArticle`].
///
/// `processing_order` is kept for sorting but never written out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleRecord {
    pub id: ContentHash,
    pub share_id: String,
    pub category: Category,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    pub source: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub speedrun: String,
    pub why_it_matters: Vec<String>,
    pub lenses: Lenses,
    pub hype_meter: u8,
    #[serde(skip)]
    pub processing_order: i64,
}

/// The rolling-window artifact (`items.json` / `items-latest.json`).
#[derive(Debug, Serialize)]
pub struct FeedOutput<'a> {
    pub generated_at: DateTime<Utc>,
    pub total_articles: usize,
    pub total_in_cache: usize,
    pub articles: Vec<&'a ArticleRecord>,
}

/// One month partition (`December_2024_News.json`).
#[derive(Debug, Serialize)]
pub struct MonthFile<'a> {
    pub month: String,
    pub year: i32,
    pub total: usize,
    pub generated_at: DateTime<Utc>,
    pub articles: Vec<&'a ArticleRecord>,
}

/// Entry of the month index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthIndexEntry {
    pub month: String,
    pub year: i32,
    pub month_num: u32,
    pub filename: String,
    pub article_count: usize,
}

/// `metadata.json`: enumerates the month partitions, newest first.
#[derive(Debug, Serialize)]
pub struct MetadataIndex {
    pub generated_at: DateTime<Utc>,
    pub total_articles: usize,
    pub total_months: usize,
    pub months: Vec<MonthIndexEntry>,
}
