//! Category classification: keyword/domain rules first, LLM tie-break second.
//!
//! The rule phase is pure and decides most items. Only items it cannot place
//! go to the model, and a failed or nonsensical model answer degrades to
//! [`Category::FALLBACK`] rather than blocking the item.

use crate::api::{AskAsync, ChatPrompt};
use crate::models::{Category, CategoryDecision, Confidence, SourceDescriptor};
use crate::utils::truncate_for_log;
use tracing::{debug, instrument, warn};

/// Research and technical publishers whose posts default to capabilities.
pub const RESEARCH_DOMAINS: &[&str] = &[
    "openai.com",
    "deepmind.google",
    "huggingface.co",
    "towardsdatascience.com",
];

/// Language that signals something shipped or is shipping.
pub const DEPLOYMENT_KEYWORDS: &[&str] = &[
    "launch",
    "rollout",
    "roll out",
    "rolling out",
    "deploys",
    "deployed",
    "integrates",
    "partners",
    "available",
    "beta",
];

/// Signals that a deployment reaches a real audience.
pub const AUDIENCE_KEYWORDS: &[&str] = &[
    "customers",
    "users",
    "enterprise",
    "businesses",
    "companies",
    "developers",
    "millions",
];

/// Policy, labor and regulatory language.
pub const POLICY_KEYWORDS: &[&str] = &[
    "policy",
    "regulation",
    "ethics",
    "governance",
    "risk",
    "impact",
    "jobs",
    "economy",
    "law",
    "lawsuit",
    "copyright",
    "workers",
];

fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

/// Keyword/domain rules. Returns `None` when the rules cannot decide.
///
/// # Arguments
///
/// * `domain` - Publisher domain of the source
/// * `title` - Item title
/// * `lede` - Lead paragraph
pub fn rule_classify(domain: &str, title: &str, lede: &str) -> Option<Category> {
    let text = format!("{title} {lede}").to_lowercase();
    let domain = domain.to_lowercase();

    let deploys = contains_any(&text, DEPLOYMENT_KEYWORDS);
    let research = RESEARCH_DOMAINS.iter().any(|d| domain.contains(d));

    if research && !deploys {
        return Some(Category::CapabilitiesAndHow);
    }
    if deploys && contains_any(&text, AUDIENCE_KEYWORDS) {
        return Some(Category::InActionRealWorld);
    }
    if contains_any(&text, POLICY_KEYWORDS) {
        return Some(Category::TrendsRisksOutlook);
    }
    None
}

fn tie_break_prompt(title: &str, lede: &str) -> ChatPrompt {
    let ids = Category::ALL.map(|c| format!("- {}", c.as_str())).join("\n");
    ChatPrompt {
        purpose: "classify",
        text: format!(
            "Classify this headline + first paragraph into exactly one category:\n\
             {ids}\n\n\
             Return ONLY the category id, nothing else.\n\n\
             Headline: {title}\n\
             Dek: {lede}"
        ),
        temperature: 0.0,
        max_tokens: Some(16),
    }
}

/// Ask the model to pick a category. Never fails.
///
/// A reply that is exactly one of the three identifiers (after trimming)
/// yields [`Confidence::Medium`]; anything else yields the fallback category
/// with [`Confidence::Low`].
#[instrument(level = "info", skip_all)]
pub async fn classify_tie_break<L: AskAsync>(llm: &L, title: &str, lede: &str) -> CategoryDecision {
    let fallback = CategoryDecision {
        category: Category::FALLBACK,
        confidence: Confidence::Low,
    };

    match llm.ask(&tie_break_prompt(title, lede)).await {
        Ok(reply) => match Category::from_token(reply.trim()) {
            Some(category) => CategoryDecision {
                category,
                confidence: Confidence::Medium,
            },
            None => {
                warn!(
                    reply = %truncate_for_log(reply.trim(), 80),
                    fallback = %Category::FALLBACK,
                    "Invalid category returned; using fallback"
                );
                fallback
            }
        },
        Err(e) => {
            warn!(error = %e, fallback = %Category::FALLBACK, "Classification call failed; using fallback");
            fallback
        }
    }
}

/// Full two-phase classification for one item.
pub async fn classify<L: AskAsync>(
    llm: &L,
    source: &SourceDescriptor,
    title: &str,
    lede: &str,
) -> CategoryDecision {
    match rule_classify(&source.domain, title, lede) {
        Some(category) => {
            debug!(%category, source = %source.id, "Rule phase decided");
            CategoryDecision {
                category,
                confidence: Confidence::High,
            }
        }
        None => classify_tie_break(llm, title, lede).await,
    }
}
