//! # aibyte_ingest
//!
//! An AI-news ingestion pipeline that reads RSS/Atom feeds, processes new
//! entries through an LLM for classification and multi-audience summaries,
//! and publishes static JSON files for a web front end.
//!
//! ## Features
//!
//! - Reads a configurable set of feeds (OpenAI, Google DeepMind, The Verge,
//!   Towards Data Science, AI Business, Reddit, AI News by default)
//! - Deduplicates entries with a content hash backed by a flat-file cache
//! - Classifies entries into three categories (rules first, model tie-break)
//! - Summarizes each entry for three audiences and scores its hype
//! - Writes a rolling latest window, month partitions and a metadata index
//! - Writes a weekly "Pattern" brief on request
//!
//! ## Usage
//!
//! ```sh
//! OPENAI_API_KEY=... aibyte_ingest
//! OPENAI_API_KEY=... aibyte_ingest pattern
//! ```
//!
//! ## Architecture
//!
//! The ingest run follows a pipeline architecture:
//! 1. **Load**: Read the cache and build the set of known hashes
//! 2. **Fetch**: Download each feed and hash its top entries
//! 3. **Processing**: Classify, summarize and score new entries (bounded concurrency)
//! 4. **Output**: Write month partitions, `metadata.json` and the latest window

use chrono::Utc;
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod aggregator;
mod api;
mod cache;
mod classifier;
mod cli;
mod config;
mod error;
mod feeds;
mod hasher;
mod hype;
mod models;
mod outputs;
mod pattern;
mod summarizer;
mod utils;

use aggregator::Aggregator;
use api::{OpenAiChat, RetryAsk, RetryPolicy};
use cache::CacheStore;
use cli::{Cli, Command};
use config::{FileConfig, PipelineConfig};
use feeds::HttpFeedFetcher;
use pattern::PatternOutcome;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("aibyte_ingest starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(cache_dir = %args.cache_dir.display(), output_dir = %args.output_dir.display(), "Parsed CLI arguments");

    // ---- Config ----
    let file_config = match &args.config {
        Some(path) => match FileConfig::load(path).await {
            Ok(file) => Some(file),
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to read config file");
                return Err(e.into());
            }
        },
        None => None,
    };
    let config = PipelineConfig::resolve(&args, file_config)?;
    info!(
        sources = config.sources.len(),
        items_per_source = config.items_per_source,
        window_days = config.window_days,
        concurrency = config.concurrency,
        model = %config.model,
        "Resolved configuration"
    );

    // ---- Model client ----
    let api_key = args.openai_api_key.clone().unwrap_or_default();
    let chat = OpenAiChat::new(api_key, &args.api_base, config.model.clone(), config.llm_timeout)?;
    let llm = RetryAsk::new(chat, RetryPolicy::default());

    match args.command() {
        Command::Ingest(_) => {
            let fetcher = HttpFeedFetcher::new(config.feed_timeout, RetryPolicy::default())?;
            let report = match Aggregator::new(&config, &llm, &fetcher).run(Utc::now()).await {
                Ok(report) => report,
                Err(e) => {
                    error!(error = %e, "Ingest run failed");
                    return Err(e.into());
                }
            };
            info!(
                new = report.new_articles,
                failed_items = report.failed_items,
                failed_sources = ?report.failed_sources,
                resummarized = report.resummarized,
                total = report.total_in_cache,
                in_window = report.in_window,
                months = report.months,
                "Ingest finished"
            );
        }
        Command::Pattern => {
            let cache = CacheStore::new(&config.cache_dir);
            debug!(entries = cache.count().await, "Cache size before pattern");
            match pattern::generate(&cache, &llm, &config.output_dir, Utc::now()).await? {
                Some(PatternOutcome::Generated(report)) => {
                    info!(week_id = %report.week_id, headline = %report.brief.headline, "Pattern ready");
                }
                Some(PatternOutcome::Fallback(fallback)) => {
                    error!(week_id = %fallback.week_id, "Pattern generation failed; fallback published");
                }
                None => info!("No pattern this week"),
            }
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
