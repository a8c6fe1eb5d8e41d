//! Generation layer: the [`PlanGenerator`] seam and an OpenAI-compatible
//! chat-completions client.

mod chat;
pub use chat::{ChatClient, DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL};

use std::time::Duration;

use async_trait::async_trait;
use nightshift_core::GenerationRequest;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned {status}: {body}")]
    Provider { status: u16, body: String },
    #[error("provider returned no text")]
    EmptyResponse,
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
}

/// Produces a plan from a prompt. One call, no retries.
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;

    /// Model identifier for logging.
    fn model_name(&self) -> &str;
}
