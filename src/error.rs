//! Error types shared by the pipeline stages.
//!
//! Most failures are recovered close to where they happen (per item, per
//! source), so these variants mostly travel a short distance before being
//! logged. Only directory setup and output writes reach `main`.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Feed parse error: {0}")]
    FeedParse(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    /// Client-error statuses that no retry will fix. 408 and 429 stay retryable.
    pub fn is_permanent(&self) -> bool {
        match self {
            PipelineError::Status { status, .. } => {
                (400..500).contains(status) && *status != 408 && *status != 429
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
