//! Multi-audience summaries from a single LLM call.
//!
//! The model is asked for a JSON object; the reply is tolerated with or
//! without a markdown fence. A reply cut off mid-JSON is re-asked once.
//! Anything still unparseable becomes [`placeholder_summary`], so every item
//! ends up with a structurally valid summary.

use crate::api::{AskAsync, ChatPrompt};
use crate::error::Result;
use crate::models::{Lenses, Summary};
use crate::utils::{looks_truncated, strip_code_fences, truncate_for_log};
use tracing::{error, info, instrument, warn};

/// Bumped whenever the summary prompt or hype formula changes meaningfully.
pub const PROMPT_VERSION: &str = "v2.0";

const SUMMARY_PROMPT: &str = r#"You are an expert AI news analyst. Create a high-quality summary that captures what makes this article unique and important.

Return ONLY a valid JSON object (no markdown formatting) with keys:

- headline: a plain, non-clickbait rewrite of the title, at most 12 words
- speedrun: 60-80 words explaining the core news/development and its immediate significance
- why_it_matters: array of exactly 2 bullets, each 20-30 words, focusing on specific implications and concrete impacts
- lenses:
  - eli12: 3-4 sentences using simple language to explain what happened, why it's cool, and what it means for regular people
  - pm: 3-4 sentences covering: who will use this, what problems it solves, competitive advantages, and real business risks/opportunities
  - engineer: 3-4 sentences on: technical approach, architecture/methods, performance characteristics, and specific limitations or constraints

If the article does not state something, write "not specified" instead of guessing.
Focus on what makes THIS article unique. Avoid generic statements. Be specific about capabilities, use cases, and implications.

Article:
"#;

/// The fixed summary used when the model reply cannot be parsed.
pub fn placeholder_summary() -> Summary {
    Summary {
        headline: None,
        speedrun: "Unable to summarize article at this time.".to_string(),
        why_it_matters: vec![
            "Summary unavailable".to_string(),
            "Please check original source".to_string(),
        ],
        lenses: Lenses {
            eli12: "We couldn't process this article right now.".to_string(),
            pm: "Article processing failed - check the original source for details.".to_string(),
            engineer: "JSON parsing error - the AI response was malformed.".to_string(),
        },
    }
}

/// Join the fields the model sees.
pub fn article_text(title: &str, lede: &str, body: &str) -> String {
    format!("{title}\n\n{lede}\n\n{body}")
}

fn summary_prompt(full_text: &str) -> ChatPrompt {
    ChatPrompt {
        purpose: "summarize",
        text: format!("{SUMMARY_PROMPT}{full_text}"),
        temperature: 0.3,
        max_tokens: Some(1200),
    }
}

fn parse_summary(reply: &str) -> std::result::Result<Summary, serde_json::Error> {
    let cleaned = strip_code_fences(reply);
    serde_json::from_str::<Summary>(&cleaned).map(normalize)
}

/// Force exactly two bullets and drop an empty headline.
fn normalize(mut summary: Summary) -> Summary {
    let padding = placeholder_summary().why_it_matters;
    summary.why_it_matters.retain(|b| !b.trim().is_empty());
    summary.why_it_matters.truncate(2);
    for filler in padding.into_iter().skip(summary.why_it_matters.len()) {
        summary.why_it_matters.push(filler);
    }
    summary.headline = summary
        .headline
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty());
    summary
}

/// Summarize one article.
///
/// # Arguments
///
/// * `llm` - Model client
/// * `full_text` - Title, lede and body as produced by [`article_text`]
///
/// # Returns
///
/// The parsed summary, or [`placeholder_summary`] when the reply is not
/// valid JSON of the expected shape.
///
/// # Errors
///
/// Only when the model call itself fails; the caller drops the item.
#[instrument(level = "info", skip_all, fields(chars = full_text.len()))]
pub async fn summarize<L: AskAsync>(llm: &L, full_text: &str) -> Result<Summary> {
    let prompt = summary_prompt(full_text);
    let reply = llm.ask(&prompt).await?;

    let mut parsed = parse_summary(&reply);

    // A reply cut off mid-object gets one more chance.
    if let Err(ref e) = parsed {
        if looks_truncated(e) {
            warn!(error = %e, "EOF while parsing summary; re-asking once");
            match llm.ask(&prompt).await {
                Ok(second) => parsed = parse_summary(&second),
                Err(e2) => warn!(error = %e2, "Re-ask failed; using placeholder"),
            }
        }
    }

    match parsed {
        Ok(summary) => {
            info!("Parsed summary");
            Ok(summary)
        }
        Err(e) => {
            error!(
                error = %e,
                response_preview = %truncate_for_log(&reply, 300),
                "Model returned non-conforming JSON; using placeholder"
            );
            Ok(placeholder_summary())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{ScriptedLlm, summary_json};
    use crate::error::PipelineError;

    #[tokio::test]
    async fn test_parses_bare_json() {
        let llm = ScriptedLlm::new().with_default("summarize", &summary_json());
        let summary = summarize(&llm, "text").await.unwrap();
        assert_eq!(summary.headline.as_deref(), Some("Model gets faster"));
        assert_eq!(summary.why_it_matters.len(), 2);
        assert!(summary.lenses.engineer.contains("Speculative"));
    }

    #[tokio::test]
    async fn test_parses_fenced_json() {
        let fenced = format!("```json\n{}\n```", summary_json());
        let llm = ScriptedLlm::new().with_default("summarize", &fenced);
        let summary = summarize(&llm, "text").await.unwrap();
        assert_ne!(summary, placeholder_summary());
        assert_eq!(summary.speedrun, "A new model runs 2x faster on the same hardware.");
    }

    #[tokio::test]
    async fn test_garbage_yields_placeholder() {
        let llm = ScriptedLlm::new().with_default("summarize", "Sorry, I can't help with that.");
        let summary = summarize(&llm, "text").await.unwrap();
        assert_eq!(summary, placeholder_summary());
        assert_eq!(llm.calls("summarize"), 1);

        let json = serde_json::to_value(&summary).unwrap();
        for key in ["speedrun", "why_it_matters", "lenses"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        for lens in ["eli12", "pm", "engineer"] {
            assert!(json["lenses"].get(lens).is_some(), "missing lens {lens}");
        }
    }

    #[tokio::test]
    async fn test_wrong_shape_yields_placeholder() {
        let llm = ScriptedLlm::new().with_default("summarize", r#"{"speedrun": "only this"}"#);
        let summary = summarize(&llm, "text").await.unwrap();
        assert_eq!(summary, placeholder_summary());
    }

    #[tokio::test]
    async fn test_truncated_reply_is_reasked_once() {
        let llm = ScriptedLlm::new().with_default("summarize", &summary_json());
        llm.push_reply("summarize", Ok(r#"{"speedrun": "cut off"#.to_string()));
        let summary = summarize(&llm, "text").await.unwrap();
        assert_ne!(summary, placeholder_summary());
        assert_eq!(llm.calls("summarize"), 2);
    }

    #[tokio::test]
    async fn test_call_failure_propagates() {
        let llm = ScriptedLlm::new().with_failure("summarize");
        let err = summarize(&llm, "text").await.unwrap_err();
        assert!(matches!(err, PipelineError::Llm(_)));
    }

    #[test]
    fn test_bullets_normalized_to_two() {
        let mut value: serde_json::Value = serde_json::from_str(&summary_json()).unwrap();
        value["why_it_matters"] = serde_json::json!(["a", "b", "c"]);
        let three = parse_summary(&value.to_string()).unwrap();
        assert_eq!(three.why_it_matters, vec!["a", "b"]);

        value["why_it_matters"] = serde_json::json!(["only one", " "]);
        let one = parse_summary(&value.to_string()).unwrap();
        assert_eq!(one.why_it_matters, vec!["only one", "Please check original source"]);
    }

    #[test]
    fn test_article_text_layout() {
        assert_eq!(article_text("T", "L", "B"), "T\n\nL\n\nB");
    }
}
