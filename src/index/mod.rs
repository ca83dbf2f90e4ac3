//! Similarity index backends
//!
//! Abstracts the vector store so backends can be swapped:
//! - `QdrantIndex`: Qdrant REST API (production)
//! - `MemoryIndex`: in-process cosine search (offline mode and tests)
//!
//! Both score with cosine similarity and store one [`KnowledgePayload`] per
//! point. Point ids derive from the entry id, so writing the same entry twice
//! overwrites it.

mod memory;
mod qdrant;

pub use memory::MemoryIndex;
pub use qdrant::QdrantIndex;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::{IndexBackend, IndexConfig, NetworkConfig};
use crate::embedding::{is_retryable_status, Embedding};
use crate::retry::Retryable;
use crate::types::KnowledgePayload;

/// Similarity index errors
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Similarity index unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),
    #[error("Similarity index request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Collection '{0}' does not exist")]
    CollectionMissing(String),
    #[error("Vector dimension mismatch: collection has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Similarity index returned status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Malformed index response: {0}")]
    Malformed(String),
}

impl Retryable for IndexError {
    fn is_retryable(&self) -> bool {
        match self {
            IndexError::Unreachable(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            IndexError::Timeout(_) => true,
            IndexError::Rejected { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    fn timed_out(after: Duration) -> Self {
        IndexError::Timeout(after)
    }
}

/// One vector with its payload, ready for upsert.
#[derive(Debug, Clone)]
pub struct IndexPoint {
    pub vector: Embedding,
    pub payload: KnowledgePayload,
}

impl IndexPoint {
    pub fn point_id(&self) -> Uuid {
        point_id(&self.payload.entry.id)
    }
}

/// Search hit.
#[derive(Debug, Clone)]
pub struct ScoredPayload {
    pub payload: KnowledgePayload,
    /// Raw cosine similarity as reported by the backend
    pub score: f64,
}

/// Deterministic point id for an entry id.
pub fn point_id(entry_id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, entry_id.as_bytes())
}

/// Vector store used by ingestion and retrieval.
///
/// Implementations must be thread-safe since every request shares one index.
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Create `collection` with cosine distance and `dimension` if it does not
    /// exist. An existing collection of another dimension is an error.
    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Result<(), IndexError>;

    /// Insert or replace points by id.
    async fn upsert(&self, collection: &str, points: &[IndexPoint]) -> Result<(), IndexError>;

    /// Up to `top_k` nearest payloads, highest score first.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredPayload>, IndexError>;

    /// Number of stored points.
    async fn count(&self, collection: &str) -> Result<usize, IndexError>;

    /// Whether the backend answers at all.
    async fn health(&self) -> bool;

    /// Backend name for logging and health checks
    fn backend_name(&self) -> &'static str;
}

/// Build the configured backend.
pub fn build_index(
    config: &IndexConfig,
    network: &NetworkConfig,
) -> Result<Arc<dyn SimilarityIndex>, IndexError> {
    let index: Arc<dyn SimilarityIndex> = match config.backend {
        IndexBackend::Qdrant => Arc::new(QdrantIndex::new(config, network)?),
        IndexBackend::Memory => Arc::new(MemoryIndex::new()),
    };
    Ok(index)
}

/// Cosine similarity in [-1, 1]; 0.0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_point_id_is_stable() {
        assert_eq!(point_id("paper-zeitung"), point_id("paper-zeitung"));
        assert_ne!(point_id("paper-zeitung"), point_id("paper-karton"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(IndexError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(IndexError::Rejected { status: 502, body: String::new() }.is_retryable());
        assert!(!IndexError::CollectionMissing("c".into()).is_retryable());
        assert!(!IndexError::DimensionMismatch { expected: 3, actual: 2 }.is_retryable());
    }
}
