//! Command-line interface definitions for the ingestion pipeline.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! The API key and base URL can also come from environment variables.
//! Options that a config file may set are `Option`s here so that an absent
//! flag falls through to the file, then to the built-in default.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Command-line arguments for the AI news ingestion pipeline.
///
/// # Examples
///
/// ```sh
/// # Fetch, summarize and publish with defaults
/// aibyte_ingest
///
/// # Custom locations and a config file
/// aibyte_ingest --cache-dir ./cache -o ./public/data -c sources.yaml ingest --items-per-source 6
///
/// # Weekly synthesis over the cache
/// aibyte_ingest pattern
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory holding one JSON file per processed article
    #[arg(long, default_value = "data/cache")]
    pub cache_dir: PathBuf,

    /// Directory the public JSON artifacts are written to
    #[arg(short, long, default_value = "public/data")]
    pub output_dir: PathBuf,

    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// API key for the chat-completions provider
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "OPENAI_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Model name (overrides the config file)
    #[arg(long)]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Fetch feeds, process new entries, regenerate outputs (default)
    Ingest(IngestArgs),
    /// Write the weekly pattern brief from the last seven days of the cache
    Pattern,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestArgs {
    /// Entries taken from the top of each feed (4-8)
    #[arg(long)]
    pub items_per_source: Option<usize>,

    /// Days of history in items.json
    #[arg(long)]
    pub window_days: Option<i64>,

    /// Items processed at once; 1 is strictly sequential
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Re-summarize cached articles produced by an older prompt version
    #[arg(long)]
    pub resummarize_stale: bool,
}

impl Cli {
    /// The chosen subcommand, with `ingest` as the default.
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Ingest(IngestArgs::default()))
    }

    pub fn ingest_args(&self) -> IngestArgs {
        match self.command() {
            Command::Ingest(args) => args,
            Command::Pattern => IngestArgs::default(),
        }
    }
}
