//! Boundary to the AI provider that will eventually answer chat prompts.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Upstream request failed: {0}")] Upstream(String),
    #[error("Timeout")] Timeout,
    #[error("Other: {0}")] Other(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

#[async_trait::async_trait]
pub trait ReplyProvider: Send + Sync + 'static {
    /// `prompt` is already validated and trimmed.
    async fn generate_reply(&self, prompt: &str) -> ProviderResult<String>;
}

pub const PLACEHOLDER_REPLY: &str =
    "This is a placeholder reply from the backend AI pipeline. Integrate provider later.";

/// Stands in for a real provider; provider keys never live in this process.
#[derive(Debug, Default, Clone)]
pub struct PlaceholderProvider;

#[async_trait::async_trait]
impl ReplyProvider for PlaceholderProvider {
    async fn generate_reply(&self, _prompt: &str) -> ProviderResult<String> {
        tracing::debug!("returning placeholder reply");
        Ok(PLACEHOLDER_REPLY.to_string())
    }
}
