//! Run configuration: CLI flags layered over an optional YAML file.
//!
//! Precedence is CLI flag, then config file, then built-in default.
//!
//! ```yaml
//! model: gpt-4o-mini
//! items_per_source: 6
//! window_days: 30
//! concurrency: 2
//! sources:
//!   - id: openai
//!     name: OpenAI
//!     rss: https://openai.com/blog/rss.xml
//!   - id: verge-ai
//!     name: The Verge (AI)
//!     rss: https://www.theverge.com/rss/ai/index.xml
//!     domain: theverge.com
//! ```
//!
//! A source without a `domain` gets the host of its feed URL.

use crate::cli::Cli;
use crate::error::{PipelineError, Result};
use crate::feeds::default_sources;
use crate::models::SourceDescriptor;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;
use tracing::{info, instrument, warn};
use url::Url;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ITEMS_PER_SOURCE: usize = 4;
pub const MIN_ITEMS_PER_SOURCE: usize = 4;
pub const MAX_ITEMS_PER_SOURCE: usize = 8;
pub const DEFAULT_WINDOW_DAYS: i64 = 30;
pub const DEFAULT_CONCURRENCY: usize = 1;
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;
const DEFAULT_FEED_TIMEOUT_SECS: u64 = 30;

/// One source as written in the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceEntry {
    pub id: String,
    pub name: String,
    pub rss: String,
    #[serde(default)]
    pub domain: Option<String>,
}

/// Everything the YAML file may set.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub sources: Option<Vec<SourceEntry>>,
    pub items_per_source: Option<usize>,
    pub window_days: Option<i64>,
    pub concurrency: Option<usize>,
    pub model: Option<String>,
    pub llm_timeout_secs: Option<u64>,
    pub feed_timeout_secs: Option<u64>,
}

impl FileConfig {
    pub fn from_yaml(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Read and parse a config file.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let config = Self::from_yaml(&raw)?;
        info!("Loaded configuration file");
        Ok(config)
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub cache_dir: PathBuf,
    pub output_dir: PathBuf,
    pub sources: Vec<SourceDescriptor>,
    pub items_per_source: usize,
    pub window_days: i64,
    pub concurrency: usize,
    pub model: String,
    pub resummarize_stale: bool,
    pub llm_timeout: StdDuration,
    pub feed_timeout: StdDuration,
}

impl PipelineConfig {
    /// Built-in defaults for the given directories.
    pub fn with_dirs(cache_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            output_dir: output_dir.into(),
            sources: default_sources(),
            items_per_source: DEFAULT_ITEMS_PER_SOURCE,
            window_days: DEFAULT_WINDOW_DAYS,
            concurrency: DEFAULT_CONCURRENCY,
            model: DEFAULT_MODEL.to_string(),
            resummarize_stale: false,
            llm_timeout: StdDuration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
            feed_timeout: StdDuration::from_secs(DEFAULT_FEED_TIMEOUT_SECS),
        }
    }

    /// Merge CLI flags over an optional file config.
    ///
    /// # Errors
    ///
    /// [`PipelineError::InvalidConfig`] for an empty source list, a source
    /// with an unparseable feed URL, a non-positive window, or zero
    /// concurrency.
    pub fn resolve(cli: &Cli, file: Option<FileConfig>) -> Result<Self> {
        let file = file.unwrap_or_default();
        let args = cli.ingest_args();
        let defaults = Self::with_dirs(&cli.cache_dir, &cli.output_dir);

        let sources = match file.sources {
            Some(entries) => entries.into_iter().map(to_descriptor).collect::<Result<Vec<_>>>()?,
            None => defaults.sources,
        };
        if sources.is_empty() {
            return Err(PipelineError::InvalidConfig("no sources configured".to_string()));
        }

        let requested = args
            .items_per_source
            .or(file.items_per_source)
            .unwrap_or(defaults.items_per_source);
        let items_per_source = requested.clamp(MIN_ITEMS_PER_SOURCE, MAX_ITEMS_PER_SOURCE);
        if items_per_source != requested {
            warn!(requested, used = items_per_source, "items_per_source out of range; clamped");
        }

        let window_days = args.window_days.or(file.window_days).unwrap_or(defaults.window_days);
        if window_days <= 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "window_days must be positive, got {window_days}"
            )));
        }

        let concurrency = args.concurrency.or(file.concurrency).unwrap_or(defaults.concurrency);
        if concurrency == 0 {
            return Err(PipelineError::InvalidConfig("concurrency must be at least 1".to_string()));
        }

        Ok(Self {
            cache_dir: cli.cache_dir.clone(),
            output_dir: cli.output_dir.clone(),
            sources,
            items_per_source,
            window_days,
            concurrency,
            model: cli.model.clone().or(file.model).unwrap_or(defaults.model),
            resummarize_stale: args.resummarize_stale,
            llm_timeout: file
                .llm_timeout_secs
                .map(StdDuration::from_secs)
                .unwrap_or(defaults.llm_timeout),
            feed_timeout: file
                .feed_timeout_secs
                .map(StdDuration::from_secs)
                .unwrap_or(defaults.feed_timeout),
        })
    }
}

fn to_descriptor(entry: SourceEntry) -> Result<SourceDescriptor> {
    let url = Url::parse(&entry.rss)
        .map_err(|e| PipelineError::InvalidConfig(format!("source {}: bad feed url: {e}", entry.id)))?;
    let domain = match entry.domain {
        Some(d) if !d.trim().is_empty() => d,
        _ => url
            .host_str()
            .map(|h| h.trim_start_matches("www.").to_string())
            .ok_or_else(|| PipelineError::InvalidConfig(format!("source {}: feed url has no host", entry.id)))?,
    };
    Ok(SourceDescriptor {
        id: entry.id,
        name: entry.name,
        rss: entry.rss,
        domain,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["aibyte_ingest"];
        full.extend_from_slice(args);
        Cli::parse_from(full)
    }

    #[test]
    fn test_defaults_without_file() {
        let config = PipelineConfig::resolve(&cli(&[]), None).unwrap();
        assert_eq!(config.items_per_source, 4);
        assert_eq!(config.window_days, 30);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.sources, default_sources());
        assert!(!config.resummarize_stale);
    }

    #[test]
    fn test_file_overrides_defaults_and_cli_overrides_file() {
        let file = FileConfig::from_yaml(
            "model: file-model\nitems_per_source: 6\nwindow_days: 10\nconcurrency: 2\n",
        )
        .unwrap();
        let config = PipelineConfig::resolve(
            &cli(&["--model", "cli-model", "ingest", "--window-days", "7"]),
            Some(file),
        )
        .unwrap();

        assert_eq!(config.model, "cli-model");
        assert_eq!(config.window_days, 7);
        assert_eq!(config.items_per_source, 6);
        assert_eq!(config.concurrency, 2);
    }

    #[test]
    fn test_items_per_source_is_clamped() {
        let high = PipelineConfig::resolve(&cli(&["ingest", "--items-per-source", "20"]), None).unwrap();
        assert_eq!(high.items_per_source, 8);
        let low = PipelineConfig::resolve(&cli(&["ingest", "--items-per-source", "1"]), None).unwrap();
        assert_eq!(low.items_per_source, 4);
    }

    #[test]
    fn test_sources_from_file_derive_domain() {
        let file = FileConfig::from_yaml(
            r#"
sources:
  - id: openai
    name: OpenAI
    rss: https://www.openai.com/blog/rss.xml
  - id: verge-ai
    name: The Verge (AI)
    rss: https://www.theverge.com/rss/ai/index.xml
    domain: theverge.com
"#,
        )
        .unwrap();
        let config = PipelineConfig::resolve(&cli(&[]), Some(file)).unwrap();
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].domain, "openai.com");
        assert_eq!(config.sources[1].domain, "theverge.com");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let bad_url = FileConfig::from_yaml("sources:\n  - {id: x, name: X, rss: not a url}\n").unwrap();
        assert!(matches!(
            PipelineConfig::resolve(&cli(&[]), Some(bad_url)),
            Err(PipelineError::InvalidConfig(_))
        ));

        let empty = FileConfig::from_yaml("sources: []\n").unwrap();
        assert!(PipelineConfig::resolve(&cli(&[]), Some(empty)).is_err());

        assert!(PipelineConfig::resolve(&cli(&["ingest", "--concurrency", "0"]), None).is_err());
        assert!(PipelineConfig::resolve(&cli(&["ingest", "--window-days", "0"]), None).is_err());
    }

    #[test]
    fn test_unknown_keys_fail_to_parse() {
        assert!(matches!(
            FileConfig::from_yaml("modle: typo\n"),
            Err(PipelineError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_load_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yaml");
        std::fs::write(&path, "window_days: 3\n").unwrap();
        let file = FileConfig::load(&path).await.unwrap();
        assert_eq!(file.window_days, Some(3));

        assert!(FileConfig::load(&tmp.path().join("missing.yaml")).await.is_err());
    }
}
