//! Embedding providers
//!
//! The classifier treats the embedding model as an opaque, possibly failing
//! function from text to a fixed-length vector. Three implementations:
//!
//! - [`OpenAiEmbedder`]: OpenAI-compatible `/embeddings` endpoint
//! - [`HashingEmbedder`]: deterministic offline feature hashing
//! - [`CachedEmbedder`]: memoizing wrapper around either of the above

mod cache;
mod hashing;
mod openai;

pub use cache::CachedEmbedder;
pub use hashing::HashingEmbedder;
pub use openai::OpenAiEmbedder;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{EmbeddingBackend, EmbeddingConfig, NetworkConfig};
use crate::retry::Retryable;

/// Dense embedding vector.
pub type Embedding = Vec<f32>;

/// Embedding provider errors
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Input text is empty")]
    EmptyInput,
    #[error("Input text has {chars} characters, limit is {limit}")]
    InputTooLong { chars: usize, limit: usize },
    #[error("Embedding provider not configured: {0}")]
    NotConfigured(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Embedding request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Embedding provider returned status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Malformed embedding response: {0}")]
    Malformed(String),
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            EmbeddingError::Timeout(_) => true,
            EmbeddingError::Rejected { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    fn timed_out(after: Duration) -> Self {
        EmbeddingError::Timeout(after)
    }
}

/// 429 and the transient 5xx family.
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Text → vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    /// Embed many texts, preserving order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Output dimensionality when known without a probe request.
    fn dimension(&self) -> Option<usize>;

    /// Short provider name for logs and health output.
    fn provider_name(&self) -> &str;

    /// Persist any cached state. No-op unless the provider caches.
    async fn persist(&self) -> Result<(), EmbeddingError> {
        Ok(())
    }
}

/// Reject empty and oversized input before it reaches a provider.
pub fn validate_input(text: &str, max_chars: usize) -> Result<&str, EmbeddingError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(EmbeddingError::EmptyInput);
    }
    let chars = trimmed.chars().count();
    if chars > max_chars {
        return Err(EmbeddingError::InputTooLong {
            chars,
            limit: max_chars,
        });
    }
    Ok(trimmed)
}

/// Build the configured provider, wrapped in a cache.
pub fn build_provider(
    config: &EmbeddingConfig,
    network: &NetworkConfig,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider {
        EmbeddingBackend::OpenAi => Arc::new(CachedEmbedder::new(
            OpenAiEmbedder::new(config, network)?,
            config.cache_file.clone(),
        )),
        EmbeddingBackend::Hashing => Arc::new(CachedEmbedder::new(
            HashingEmbedder::new(config.dimensions, config.max_input_chars),
            config.cache_file.clone(),
        )),
    };
    Ok(provider)
}
