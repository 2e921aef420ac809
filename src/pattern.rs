//! "The Pattern": a weekly brief that connects the last seven days of news.
//!
//! One creative LLM call over the week's cached articles. The reply is
//! parsed into a [`PatternBrief`] and published as `pattern-latest.json`
//! plus an archive copy named after the ISO week. When the call or the
//! parse fails, a clearly flagged fallback brief replaces only the latest
//! file so the front end always has something to show.

use crate::api::{AskAsync, ChatPrompt};
use crate::cache::CacheStore;
use crate::error::Result;
use crate::models::{CachedArticle, Category};
use crate::outputs::write_pretty;
use crate::utils::{ensure_writable_dir, extract_json_object, strip_code_fences, truncate_for_log};
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{error, info, instrument, warn};

pub const LATEST_FILE: &str = "pattern-latest.json";

/// Fewer articles than this and there is no pattern worth writing about.
pub const MIN_ARTICLES: usize = 3;

const LOOKBACK_DAYS: i64 = 7;
const FALLBACK_TIMELINE_LEN: usize = 5;

/// A cached article as the brief references it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekArticle {
    pub title: String,
    pub date: DateTime<Utc>,
    #[serde(rename = "dayOfWeek")]
    pub day_of_week: String,
    pub summary: String,
    pub source: String,
    pub category: Category,
    pub url: String,
}

impl From<&CachedArticle> for WeekArticle {
    fn from(a: &CachedArticle) -> Self {
        Self {
            title: a.title.clone(),
            date: a.published_at,
            day_of_week: a.published_at.format("%a").to_string(),
            summary: a.speedrun.clone(),
            source: a.source.clone(),
            category: a.category,
            url: a.url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TimelineEntry {
    pub day: String,
    pub event: String,
    pub context: String,
}

/// What the model writes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PatternBrief {
    pub headline: String,
    pub hook: String,
    pub story: String,
    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,
    #[serde(default)]
    pub twist: String,
    #[serde(default)]
    pub winners: String,
    #[serde(default)]
    pub losers: String,
    #[serde(default)]
    pub dark_horse: String,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub prediction: String,
    #[serde(default)]
    pub quote: String,
}

/// The published brief: model output plus week metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternReport {
    #[serde(flatten)]
    pub brief: PatternBrief,
    pub week_id: String,
    pub week_start: DateTime<Utc>,
    pub week_end: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub article_count: usize,
    pub articles: Vec<WeekArticle>,
}

/// Written in place of the brief when generation fails.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackPattern {
    pub headline: String,
    pub hook: String,
    pub story: String,
    pub timeline: Vec<TimelineEntry>,
    pub error: bool,
    pub week_id: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternOutcome {
    Generated(PatternReport),
    Fallback(FallbackPattern),
}

/// ISO week identifier, e.g. `2025-w07`.
pub fn week_id(now: DateTime<Utc>) -> String {
    let week = now.iso_week();
    format!("{}-w{:02}", week.year(), week.week())
}

/// Articles published in the last seven days, oldest first.
pub fn last_week(articles: &[CachedArticle], now: DateTime<Utc>) -> Vec<WeekArticle> {
    let cutoff = now - Duration::days(LOOKBACK_DAYS);
    let mut week: Vec<WeekArticle> = articles
        .iter()
        .filter(|a| a.published_at >= cutoff)
        .map(WeekArticle::from)
        .collect();
    week.sort_by_key(|a| a.date);
    week
}

fn pattern_prompt(articles: &[WeekArticle]) -> ChatPrompt {
    let listing = articles
        .iter()
        .map(|a| format!("{}: \"{}\" ({})\nSummary: {}\n", a.day_of_week, a.title, a.source, a.summary))
        .collect::<Vec<_>>()
        .join("\n");

    ChatPrompt {
        purpose: "pattern",
        text: format!(
            r#"You are the lead analyst writing "The Pattern", a weekly brief that reveals the connection other coverage missed.

Here are {count} AI news articles from the past week:
{listing}
Find the non-obvious thread connecting these stories: the force, fear or opportunity underneath them.

Return ONLY valid JSON with exactly these keys:
{{
  "headline": "5-8 word title naming the hidden pattern",
  "hook": "one sentence that connects the dots for the reader",
  "story": "2-3 sentences on WHY these happened together",
  "timeline": [{{"day": "Mon", "event": "event name", "context": "why it matters to the pattern"}}],
  "twist": "the counterintuitive insight",
  "winners": "specific companies or roles that benefit",
  "losers": "specific companies or roles that must adapt",
  "dark_horse": "the unexpected player who might win",
  "actions": ["action for Monday morning", "position to take this month", "opportunity others miss"],
  "prediction": "one specific thing that will happen in the next two weeks",
  "quote": "one shareable line capturing the week"
}}

Be specific with company names and roles."#,
            count = articles.len(),
        ),
        temperature: 0.7,
        max_tokens: Some(1500),
    }
}

fn parse_brief(reply: &str) -> std::result::Result<PatternBrief, serde_json::Error> {
    let cleaned = strip_code_fences(reply);
    serde_json::from_str(extract_json_object(&cleaned))
}

fn fallback(articles: &[WeekArticle], now: DateTime<Utc>) -> FallbackPattern {
    FallbackPattern {
        headline: "This Week in AI".to_string(),
        hook: "Pattern analysis unavailable".to_string(),
        story: "We're having trouble analyzing this week's patterns. Check back soon.".to_string(),
        timeline: articles
            .iter()
            .take(FALLBACK_TIMELINE_LEN)
            .map(|a| TimelineEntry {
                day: a.day_of_week.clone(),
                event: a.title.clone(),
                context: "Analysis pending".to_string(),
            })
            .collect(),
        error: true,
        week_id: week_id(now),
        generated_at: now,
    }
}

/// Generate and publish this week's brief.
///
/// # Returns
///
/// `None` when the week has fewer than [`MIN_ARTICLES`] articles (nothing
/// is written). Otherwise the brief, or the fallback that was written
/// instead of it.
///
/// # Errors
///
/// Only when the output directory is unusable or a file cannot be written.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display()))]
pub async fn generate<L: AskAsync>(
    cache: &CacheStore,
    llm: &L,
    output_dir: &Path,
    now: DateTime<Utc>,
) -> Result<Option<PatternOutcome>> {
    let articles = last_week(&cache.load_all().await, now);
    info!(count = articles.len(), "Collected articles from the past week");

    if articles.len() < MIN_ARTICLES {
        warn!(count = articles.len(), min = MIN_ARTICLES, "Not enough articles for a pattern");
        return Ok(None);
    }
    ensure_writable_dir(output_dir).await?;

    let brief = match llm.ask(&pattern_prompt(&articles)).await {
        Ok(reply) => match parse_brief(&reply) {
            Ok(brief) => Some(brief),
            Err(e) => {
                error!(
                    error = %e,
                    response_preview = %truncate_for_log(&reply, 300),
                    "Pattern reply is not valid JSON"
                );
                None
            }
        },
        Err(e) => {
            error!(error = %e, "Pattern call failed");
            None
        }
    };

    let Some(brief) = brief else {
        let fallback = fallback(&articles, now);
        write_pretty(&output_dir.join(LATEST_FILE), &fallback).await?;
        warn!("Wrote fallback pattern");
        return Ok(Some(PatternOutcome::Fallback(fallback)));
    };

    let report = PatternReport {
        brief,
        week_id: week_id(now),
        week_start: now - Duration::days(LOOKBACK_DAYS - 1),
        week_end: now,
        generated_at: now,
        article_count: articles.len(),
        articles,
    };

    write_pretty(&output_dir.join(LATEST_FILE), &report).await?;
    write_pretty(&output_dir.join(format!("pattern-{}.json", report.week_id)), &report).await?;
    info!(week_id = %report.week_id, headline = %report.brief.headline, "Wrote weekly pattern");
    Ok(Some(PatternOutcome::Generated(report)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::ScriptedLlm;
    use crate::models::fixtures;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        // A Wednesday in ISO week 7.
        Utc.with_ymd_and_hms(2025, 2, 12, 18, 0, 0).unwrap()
    }

    fn brief_json() -> String {
        serde_json::json!({
            "headline": "Everyone Is Building Agents Now",
            "hook": "Three launches, one bet.",
            "story": "Vendors converged on agents because chat stalled.",
            "timeline": [{"day": "Mon", "event": "Launch", "context": "First mover"}],
            "twist": "The winners sell the plumbing.",
            "winners": "Cloud providers",
            "losers": "Point-solution startups",
            "dark_horse": "Open-source runtimes",
            "actions": ["Audit workflows", "Pilot one agent", "Watch pricing"],
            "prediction": "A major agent outage within two weeks.",
            "quote": "Agents are the new apps."
        })
        .to_string()
    }

    async fn seeded_cache(dir: &Path, ages_hours: &[i64]) -> CacheStore {
        let store = CacheStore::new(dir);
        for (i, hours) in ages_hours.iter().enumerate() {
            let article = fixtures::article(&format!("hash{i:02}"), now() - Duration::hours(*hours), i as i64);
            store.write(&article.content_hash, &article).await.unwrap();
        }
        store
    }

    #[test]
    fn test_week_id_is_iso() {
        assert_eq!(week_id(now()), "2025-w07");
        // 2024-12-30 belongs to ISO week 1 of 2025.
        assert_eq!(week_id(Utc.with_ymd_and_hms(2024, 12, 30, 0, 0, 0).unwrap()), "2025-w01");
    }

    #[test]
    fn test_last_week_filters_and_orders() {
        let articles = vec![
            fixtures::article("a", now() - Duration::hours(1), 0),
            fixtures::article("b", now() - Duration::days(8), 0),
            fixtures::article("c", now() - Duration::days(3), 0),
        ];
        let week = last_week(&articles, now());
        let titles: Vec<_> = week.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Title c", "Title a"]);
        assert_eq!(week[1].day_of_week, "Wed");
    }

    #[tokio::test]
    async fn test_too_few_articles_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("cache")).unwrap();
        let cache = seeded_cache(&tmp.path().join("cache"), &[1, 2, 300]).await;
        let out = tmp.path().join("out");
        let llm = ScriptedLlm::new().with_default("pattern", &brief_json());

        let outcome = generate(&cache, &llm, &out, now()).await.unwrap();
        assert!(outcome.is_none());
        assert_eq!(llm.calls("pattern"), 0);
        assert!(!out.join(LATEST_FILE).exists());
    }

    #[tokio::test]
    async fn test_generates_latest_and_archive() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("cache")).unwrap();
        let cache = seeded_cache(&tmp.path().join("cache"), &[1, 30, 60, 90]).await;
        let out = tmp.path().join("out");
        let fenced = format!("Here you go:\n```json\n{}\n```", brief_json());
        let llm = ScriptedLlm::new().with_default("pattern", &fenced);

        let outcome = generate(&cache, &llm, &out, now()).await.unwrap();
        let Some(PatternOutcome::Generated(report)) = outcome else {
            panic!("expected a generated pattern");
        };
        assert_eq!(report.article_count, 4);
        assert_eq!(report.week_id, "2025-w07");

        let prompt = &llm.prompts("pattern")[0];
        assert_eq!(prompt.temperature, 0.7);
        assert_eq!(prompt.max_tokens, Some(1500));

        let latest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join(LATEST_FILE)).unwrap()).unwrap();
        assert_eq!(latest["headline"], "Everyone Is Building Agents Now");
        assert_eq!(latest["article_count"], 4);
        assert_eq!(latest["articles"][0]["dayOfWeek"], "Sun");
        assert!(latest.get("error").is_none());
        assert!(out.join("pattern-2025-w07.json").is_file());
    }

    #[tokio::test]
    async fn test_bad_reply_writes_fallback_to_latest_only() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("cache")).unwrap();
        let ages: Vec<i64> = (1..=7).map(|d| d * 20).collect();
        let cache = seeded_cache(&tmp.path().join("cache"), &ages).await;
        let out = tmp.path().join("out");
        let llm = ScriptedLlm::new().with_default("pattern", "I cannot find a pattern.");

        let outcome = generate(&cache, &llm, &out, now()).await.unwrap();
        let Some(PatternOutcome::Fallback(fallback)) = outcome else {
            panic!("expected a fallback");
        };
        assert!(fallback.error);
        assert_eq!(fallback.timeline.len(), 5);
        assert!(fallback.timeline.iter().all(|t| t.context == "Analysis pending"));

        let latest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join(LATEST_FILE)).unwrap()).unwrap();
        assert_eq!(latest["error"], true);
        assert_eq!(latest["headline"], "This Week in AI");
        assert!(!out.join("pattern-2025-w07.json").exists());
    }

    #[tokio::test]
    async fn test_call_failure_writes_fallback() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("cache")).unwrap();
        let cache = seeded_cache(&tmp.path().join("cache"), &[1, 2, 3]).await;
        let out = tmp.path().join("out");
        let llm = ScriptedLlm::new().with_failure("pattern");

        let outcome = generate(&cache, &llm, &out, now()).await.unwrap();
        assert!(matches!(outcome, Some(PatternOutcome::Fallback(_))));
        assert!(out.join(LATEST_FILE).is_file());
    }
}
