//! Feed sources and fetching.
//!
//! Each source is one RSS 2.0 or Atom feed. Fetching follows a simple
//! pattern:
//!
//! 1. **Download**: GET the feed URL, bounded by a timeout and retried with
//!    backoff (see [`crate::api::with_backoff`])
//! 2. **Parse**: turn the document into [`RawFeedItem`]s via [`parse_feed`]
//!
//! # Built-in Sources
//!
//! | Id | Name | Domain |
//! |----|------|--------|
//! | `openai` | OpenAI | openai.com |
//! | `deepmind` | Google DeepMind | deepmind.google |
//! | `verge-ai` | The Verge (AI) | theverge.com |
//! | `towards-data-science` | Towards Data Science | towardsdatascience.com |
//! | `ai-business` | AI Business | aibusiness.com |
//! | `reddit-chatgpt` | Reddit ChatGPT | reddit.com |
//! | `ai-news` | AI News | artificialintelligence-news.com |

pub mod parser;

pub use parser::parse_feed;

use crate::api::{RetryPolicy, with_backoff};
use crate::error::{PipelineError, Result};
use crate::models::{RawFeedItem, SourceDescriptor};
use chrono::Utc;
use std::time::Duration as StdDuration;
use tracing::{info, instrument};

/// Anything that can turn a source into feed entries.
///
/// The aggregator only depends on this trait, so tests can serve canned
/// entries without a network.
pub trait FeedFetcher {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<Vec<RawFeedItem>>;
}

/// The seven sources the pipeline reads when no config file overrides them.
pub fn default_sources() -> Vec<SourceDescriptor> {
    vec![
        SourceDescriptor::new("openai", "OpenAI", "https://openai.com/blog/rss.xml", "openai.com"),
        SourceDescriptor::new(
            "deepmind",
            "Google DeepMind",
            "https://deepmind.google/discover/rss",
            "deepmind.google",
        ),
        SourceDescriptor::new(
            "verge-ai",
            "The Verge (AI)",
            "https://www.theverge.com/rss/ai/index.xml",
            "theverge.com",
        ),
        SourceDescriptor::new(
            "towards-data-science",
            "Towards Data Science",
            "https://towardsdatascience.com/feed",
            "towardsdatascience.com",
        ),
        SourceDescriptor::new("ai-business", "AI Business", "https://aibusiness.com/rss.xml", "aibusiness.com"),
        SourceDescriptor::new(
            "reddit-chatgpt",
            "Reddit ChatGPT",
            "https://www.reddit.com/r/ChatGPT/.rss",
            "reddit.com",
        ),
        SourceDescriptor::new(
            "ai-news",
            "AI News",
            "https://www.artificialintelligence-news.com/feed/rss/",
            "artificialintelligence-news.com",
        ),
    ]
}

/// Fetches feeds over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpFeedFetcher {
    http: reqwest::Client,
    policy: RetryPolicy,
}

impl HttpFeedFetcher {
    /// Build a fetcher whose every request is bounded by `request_timeout`.
    pub fn new(request_timeout: StdDuration, policy: RetryPolicy) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("aibyte_ingest/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(StdDuration::from_secs(10))
            .timeout(request_timeout)
            .build()?;
        Ok(Self { http, policy })
    }

    async fn download(&self, url: &str) -> Result<String> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(resp.text().await?)
    }
}

impl FeedFetcher for HttpFeedFetcher {
    #[instrument(level = "info", skip_all, fields(source = %source.id))]
    async fn fetch(&self, source: &SourceDescriptor) -> Result<Vec<RawFeedItem>> {
        let what = format!("feed:{}", source.id);
        let body = with_backoff(&self.policy, &what, || self.download(&source.rss)).await?;
        let items = parse_feed(&body, Utc::now())?;
        info!(count = items.len(), bytes = body.len(), "Fetched feed");
        Ok(items)
    }
}
