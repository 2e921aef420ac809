//! LLM API interaction with exponential backoff retry logic.
//!
//! This module provides the interface for talking to an OpenAI-compatible
//! chat-completions endpoint. It includes automatic retry logic with
//! exponential backoff, jitter, and a per-attempt timeout to ride out
//! transient failures.
//!
//! # Architecture
//!
//! - [`AskAsync`]: Core trait defining async LLM interaction
//! - [`OpenAiChat`]: Sends a single user-role message over HTTP
//! - [`RetryAsk`]: Decorator that adds retry logic to any `AskAsync` implementation
//! - [`with_backoff`]: The retry loop itself, shared with feed fetching
//!
//! # Retry Strategy
//!
//! - Bounded retry attempts (3 by default)
//! - Exponential backoff starting at 1 second
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use crate::error::{PipelineError, Result};
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, instrument, warn};

/// A single-message chat request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatPrompt {
    /// Short label used in logs (`"classify"`, `"summarize"`, `"pattern"`).
    pub purpose: &'static str,
    /// The user-role message.
    pub text: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

/// Trait for async LLM interaction.
///
/// Implementors send a prompt to a model and return the raw response text.
/// The pipeline only depends on this trait, so tests can swap in a
/// scripted model.
pub trait AskAsync {
    async fn ask(&self, prompt: &ChatPrompt) -> Result<String>;
}

/// Retry, backoff and timeout settings for one kind of external call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    pub base_delay: StdDuration,
    /// Maximum delay cap to prevent excessive waiting.
    pub max_delay: StdDuration,
    /// Upper bound on a single attempt.
    pub attempt_timeout: StdDuration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: StdDuration::from_secs(1),
            max_delay: StdDuration::from_secs(30),
            attempt_timeout: StdDuration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), without jitter.
    pub fn delay_for(&self, attempt: usize) -> StdDuration {
        let exp = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(2u32.saturating_pow(exp));
        delay.min(self.max_delay)
    }
}

/// Run `op` until it succeeds or the policy is exhausted.
///
/// Each attempt is bounded by `policy.attempt_timeout`. The delay between
/// attempts follows:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
///
/// # Returns
///
/// The first successful result, or the last error once retries run out.
pub async fn with_backoff<T, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let total_t0 = Instant::now();
    let mut attempt = 0usize;

    loop {
        let attempt_t0 = Instant::now();
        let outcome = match timeout(policy.attempt_timeout, op()).await {
            Ok(res) => res,
            Err(_) => Err(PipelineError::Timeout(policy.attempt_timeout)),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                let attempt_dt = attempt_t0.elapsed();
                let total_dt = total_t0.elapsed();

                if e.is_permanent() {
                    error!(
                        what,
                        attempt,
                        elapsed_ms_total = total_dt.as_millis(),
                        error = %e,
                        "permanent failure; not retrying"
                    );
                    return Err(e);
                }

                if attempt > policy.max_retries {
                    error!(
                        what,
                        attempt,
                        max = policy.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis(),
                        elapsed_ms_total = total_dt.as_millis(),
                        error = %e,
                        "exhausted retries"
                    );
                    return Err(e);
                }

                let jitter_ms: u64 = rng().random_range(0..=250);
                let delay = policy.delay_for(attempt) + StdDuration::from_millis(jitter_ms);

                warn!(
                    what,
                    attempt,
                    max = policy.max_retries,
                    elapsed_ms_attempt = attempt_dt.as_millis(),
                    elapsed_ms_total = total_dt.as_millis(),
                    ?delay,
                    error = %e,
                    "attempt failed; backing off"
                );
                sleep(delay).await;
            }
        }
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
pub struct RetryAsk<T> {
    /// The underlying LLM client to wrap.
    inner: T,
    policy: RetryPolicy,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Create a new retry wrapper around an existing [`AskAsync`] implementation.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = OpenAiChat::new(api_key, api_base, model, timeout)?;
    /// let retry_client = RetryAsk::new(client, RetryPolicy::default());
    /// ```
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("policy", &self.policy)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync,
{
    #[instrument(level = "info", skip_all, fields(purpose = prompt.purpose))]
    async fn ask(&self, prompt: &ChatPrompt) -> Result<String> {
        let inner = &self.inner;
        with_backoff(&self.policy, prompt.purpose, move || inner.ask(prompt)).await
    }
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChat {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl fmt::Debug for OpenAiChat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiChat {
    /// Build a client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Bearer token for the provider
    /// * `api_base` - Base URL, e.g. `https://api.openai.com/v1`
    /// * `model` - Model name sent with every request
    /// * `request_timeout` - Timeout for one HTTP exchange
    pub fn new(
        api_key: String,
        api_base: &str,
        model: String,
        request_timeout: StdDuration,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "missing LLM API key (set OPENAI_API_KEY)".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("aibyte_ingest/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(StdDuration::from_secs(10))
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            api_key,
            endpoint: format!("{}/chat/completions", api_base.trim_end_matches('/')),
            model,
        })
    }
}

impl AskAsync for OpenAiChat {
    #[instrument(level = "debug", skip_all, fields(purpose = prompt.purpose, model = %self.model))]
    async fn ask(&self, prompt: &ChatPrompt) -> Result<String> {
        let t0 = Instant::now();
        let req = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt.text,
            }],
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            warn!(
                status = status.as_u16(),
                elapsed_ms = t0.elapsed().as_millis(),
                "chat completion rejected"
            );
            return Err(PipelineError::Status {
                status: status.as_u16(),
                url: self.endpoint.clone(),
            });
        }

        let body: ChatResponse = resp.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| PipelineError::Llm("completion had no content".to_string()))?;
        debug!(
            elapsed_ms = t0.elapsed().as_millis(),
            bytes = content.len(),
            "chat completion received"
        );
        Ok(content)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory model for pipeline tests.

    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    type Reply = std::result::Result<String, String>;

    /// Answers by prompt purpose: queued replies first, then a default.
    #[derive(Default)]
    pub struct ScriptedLlm {
        queued: Mutex<HashMap<&'static str, VecDeque<Reply>>>,
        defaults: HashMap<&'static str, Reply>,
        calls: Mutex<Vec<ChatPrompt>>,
    }

    impl ScriptedLlm {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_default(mut self, purpose: &'static str, reply: &str) -> Self {
            self.defaults.insert(purpose, Ok(reply.to_string()));
            self
        }

        pub fn with_failure(mut self, purpose: &'static str) -> Self {
            self.defaults.insert(purpose, Err("scripted failure".to_string()));
            self
        }

        pub fn push_reply(&self, purpose: &'static str, reply: Reply) {
            self.queued
                .lock()
                .unwrap()
                .entry(purpose)
                .or_default()
                .push_back(reply);
        }

        pub fn calls(&self, purpose: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.purpose == purpose)
                .count()
        }

        pub fn prompts(&self, purpose: &str) -> Vec<ChatPrompt> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.purpose == purpose)
                .cloned()
                .collect()
        }
    }

    impl AskAsync for ScriptedLlm {
        async fn ask(&self, prompt: &ChatPrompt) -> Result<String> {
            self.calls.lock().unwrap().push(prompt.clone());
            let queued = self
                .queued
                .lock()
                .unwrap()
                .get_mut(prompt.purpose)
                .and_then(|q| q.pop_front());
            let reply = queued
                .or_else(|| self.defaults.get(prompt.purpose).cloned())
                .unwrap_or_else(|| Err(format!("no scripted reply for {}", prompt.purpose)));
            reply.map_err(PipelineError::Llm)
        }
    }

    /// A well-formed summarizer reply.
    pub fn summary_json() -> String {
        serde_json::json!({
            "headline": "Model gets faster",
            "speedrun": "A new model runs 2x faster on the same hardware.",
            "why_it_matters": [
                "Lower serving costs for teams already running the model.",
                "Latency-sensitive products become practical."
            ],
            "lenses": {
                "eli12": "The computer brain answers quicker now.",
                "pm": "Cheaper inference widens the addressable market.",
                "engineer": "Speculative decoding cuts median latency."
            }
        })
        .to_string()
    }
}
