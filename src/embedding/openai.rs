//! OpenAI-compatible embedding client

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{validate_input, Embedding, EmbeddingError, EmbeddingProvider};
use crate::config::{EmbeddingConfig, NetworkConfig};
use crate::retry::{with_retry, RetryPolicy};

/// Longest error body kept in `EmbeddingError::Rejected`.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Embedding,
}

/// Client for `POST {base_url}/embeddings`.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    batch_size: usize,
    max_input_chars: usize,
    retry: RetryPolicy,
}

impl OpenAiEmbedder {
    /// Build a client. A missing API key is reported on first use, so the
    /// service can still start and answer UNKNOWN.
    pub fn new(config: &EmbeddingConfig, network: &NetworkConfig) -> Result<Self, EmbeddingError> {
        let http = reqwest::Client::builder()
            .timeout(network.request_timeout())
            .connect_timeout(network.connect_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            batch_size: config.batch_size.max(1),
            max_input_chars: config.max_input_chars,
            retry: network.retry_policy(),
        })
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| EmbeddingError::NotConfigured("OPENAI_API_KEY is not set".into()))?;

        let body = serde_json::json!({
            "model": self.model,
            "input": inputs,
        });

        let resp = self
            .http
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let mut body = resp.text().await.unwrap_or_default();
            truncate_at_char_boundary(&mut body, MAX_ERROR_BODY);
            return Err(EmbeddingError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbeddingsResponse = resp
            .json()
            .await
            .map_err(|e| EmbeddingError::Malformed(e.to_string()))?;
        order_response(parsed, inputs.len())
    }
}

/// Restore input order by `index` and check the count.
fn order_response(
    mut parsed: EmbeddingsResponse,
    expected: usize,
) -> Result<Vec<Embedding>, EmbeddingError> {
    if parsed.data.len() != expected {
        return Err(EmbeddingError::Malformed(format!(
            "expected {} embeddings, got {}",
            expected,
            parsed.data.len()
        )));
    }
    parsed.data.sort_by_key(|d| d.index);
    let vectors: Vec<Embedding> = parsed.data.into_iter().map(|d| d.embedding).collect();
    if vectors.iter().any(Vec::is_empty) {
        return Err(EmbeddingError::Malformed("empty embedding vector".into()));
    }
    Ok(vectors)
}

fn truncate_at_char_boundary(s: &mut String, max: usize) {
    if s.len() > max {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let input = [validate_input(text, self.max_input_chars)?.to_string()];
        let mut vectors = with_retry(self.retry, "embed", || self.request(&input)).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::Malformed("no embedding returned".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        let inputs = texts
            .iter()
            .map(|t| validate_input(t, self.max_input_chars).map(str::to_string))
            .collect::<Result<Vec<_>, _>>()?;

        let mut out = Vec::with_capacity(inputs.len());
        for chunk in inputs.chunks(self.batch_size) {
            debug!(model = %self.model, batch = chunk.len(), "Requesting embeddings");
            let vectors = with_retry(self.retry, "embed_batch", || self.request(chunk)).await?;
            out.extend(vectors);
        }
        Ok(out)
    }

    fn dimension(&self) -> Option<usize> {
        match self.model.as_str() {
            "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
            "text-embedding-3-large" => Some(3072),
            _ => None,
        }
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}
