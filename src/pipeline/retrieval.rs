//! Retrieval engine: query text → ranked neighbors

use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::index::{IndexError, ScoredPayload, SimilarityIndex};
use crate::types::NeighborMatch;

/// Extra hits requested from the index so ties at the cutoff are resolved
/// by insertion order here rather than by the backend.
const TIE_OVERFETCH: usize = 4;

/// Failure to produce neighbors for a query.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("similarity search failed: {0}")]
    Index(#[from] IndexError),
}

impl RetrievalError {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RetrievalError::Embedding(EmbeddingError::EmptyInput) => "empty_input",
            RetrievalError::Embedding(EmbeddingError::InputTooLong { .. }) => "input_too_long",
            RetrievalError::Embedding(_) => "embedding_provider",
            RetrievalError::Index(IndexError::CollectionMissing(_)) => "collection_missing",
            RetrievalError::Index(_) => "similarity_index",
        }
    }

    /// The description itself was unusable; no dependency was at fault.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            RetrievalError::Embedding(EmbeddingError::EmptyInput | EmbeddingError::InputTooLong { .. })
        )
    }
}

pub struct RetrievalEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn SimilarityIndex>,
    collection: String,
}

impl RetrievalEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn SimilarityIndex>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            index,
            collection: collection.into(),
        }
    }

    pub fn index(&self) -> &Arc<dyn SimilarityIndex> {
        &self.index
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Up to `top_k` neighbors, highest similarity first. Equal similarities
    /// keep insertion order.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<NeighborMatch>, RetrievalError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed(query).await?;
        let limit = top_k.saturating_add(TIE_OVERFETCH);
        let hits = self.index.search(&self.collection, &vector, limit).await?;
        debug!(hits = hits.len(), top_k, limit, "Similarity search complete");
        Ok(rank(hits, top_k))
    }
}

/// Clamp scores to [0, 1], order by similarity then insertion ordinal.
fn rank(hits: Vec<ScoredPayload>, top_k: usize) -> Vec<NeighborMatch> {
    let mut ranked: Vec<(u64, NeighborMatch)> = hits
        .into_iter()
        .map(|hit| {
            let similarity = if hit.score.is_nan() { 0.0 } else { hit.score.clamp(0.0, 1.0) };
            (
                hit.payload.seq,
                NeighborMatch {
                    entry: hit.payload.entry,
                    similarity,
                },
            )
        })
        .collect();
    ranked.sort_by(|(seq_a, a), (seq_b, b)| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then(seq_a.cmp(seq_b))
    });
    ranked.truncate(top_k);
    ranked.into_iter().map(|(_, m)| m).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::index::{IndexPoint, MemoryIndex};
    use crate::knowledge_base::entry_for;
    use crate::types::{Category, EntrySource, KnowledgePayload};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    /// Index that returns equal-score hits newest first and honours the
    /// requested limit, like a backend with its own tie order.
    struct TiedIndex {
        seqs: Vec<u64>,
        last_limit: AtomicUsize,
    }

    #[async_trait]
    impl SimilarityIndex for TiedIndex {
        async fn ensure_collection(&self, _collection: &str, _dimension: usize) -> Result<(), IndexError> {
            Ok(())
        }

        async fn upsert(&self, _collection: &str, _points: &[IndexPoint]) -> Result<(), IndexError> {
            Ok(())
        }

        async fn search(
            &self,
            _collection: &str,
            _vector: &[f32],
            top_k: usize,
        ) -> Result<Vec<ScoredPayload>, IndexError> {
            self.last_limit.store(top_k, AtomicOrdering::SeqCst);
            Ok(self
                .seqs
                .iter()
                .take(top_k)
                .map(|seq| hit(&format!("item-{seq}"), *seq, 0.8))
                .collect())
        }

        async fn count(&self, _collection: &str) -> Result<usize, IndexError> {
            Ok(self.seqs.len())
        }

        async fn health(&self) -> bool {
            true
        }

        fn backend_name(&self) -> &'static str {
            "tied"
        }
    }

    fn hit(id: &str, seq: u64, score: f64) -> ScoredPayload {
        ScoredPayload {
            payload: KnowledgePayload {
                entry: entry_for(Category::Plastic, id, "Gelber Sack"),
                content: id.to_string(),
                seq,
                source: EntrySource::RecyclingKnowledgeBase,
                created_at: Utc::now(),
            },
            score,
        }
    }

    #[test]
    fn test_rank_clamps_and_breaks_ties_by_seq() {
        let ranked = rank(
            vec![hit("b", 5, 0.7), hit("a", 2, 0.7), hit("c", 1, 1.3), hit("d", 0, -0.2)],
            10,
        );
        let ids: Vec<_> = ranked.iter().map(|m| m.entry.text.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b", "d"]);
        assert_eq!(ranked[0].similarity, 1.0);
        assert_eq!(ranked[3].similarity, 0.0);
    }

    #[test]
    fn test_rank_truncates() {
        assert_eq!(rank(vec![hit("a", 0, 0.5), hit("b", 1, 0.4)], 1).len(), 1);
    }

    #[tokio::test]
    async fn test_retrieve_from_memory_index() {
        let embedder = Arc::new(HashingEmbedder::new(128, 8_000));
        let index = Arc::new(MemoryIndex::new());
        index.ensure_collection("kb", 128).await.unwrap();
        let entries = [
            entry_for(Category::Paper, "Zeitung", "Blaue Tonne"),
            entry_for(Category::Glass, "Weinflasche", "Glascontainer"),
        ];
        let points: Vec<IndexPoint> = entries
            .iter()
            .enumerate()
            .map(|(i, e)| IndexPoint {
                vector: embedder.vectorize(&e.text),
                payload: KnowledgePayload {
                    entry: e.clone(),
                    content: e.text.clone(),
                    seq: i as u64,
                    source: EntrySource::RecyclingKnowledgeBase,
                    created_at: Utc::now(),
                },
            })
            .collect();
        index.upsert("kb", &points).await.unwrap();

        let engine = RetrievalEngine::new(embedder, index, "kb");
        let neighbors = engine.retrieve("Zeitung", 3).await.unwrap();
        assert_eq!(neighbors.len(), 2);
        assert_eq!(neighbors[0].entry.category, Category::Paper);
        assert!(neighbors[0].similarity > 0.99);
    }

    #[tokio::test]
    async fn test_cutoff_tie_keeps_earliest_ingested() {
        let index = Arc::new(TiedIndex {
            seqs: vec![9, 7, 3, 1],
            last_limit: AtomicUsize::new(0),
        });
        let engine = RetrievalEngine::new(Arc::new(HashingEmbedder::new(16, 8_000)), index.clone(), "kb");

        let neighbors = engine.retrieve("Dose", 1).await.unwrap();
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].entry.text, "item-1");
        assert!(index.last_limit.load(AtomicOrdering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn test_invalid_input_is_not_a_dependency_error() {
        let engine = RetrievalEngine::new(
            Arc::new(HashingEmbedder::new(16, 8)),
            Arc::new(MemoryIndex::new()),
            "kb",
        );
        assert!(engine.retrieve("   ", 3).await.unwrap_err().is_invalid_input());
        assert!(engine.retrieve("Joghurtbecher", 3).await.unwrap_err().is_invalid_input());
    }

    #[tokio::test]
    async fn test_missing_collection_is_index_error() {
        let engine = RetrievalEngine::new(
            Arc::new(HashingEmbedder::new(16, 8_000)),
            Arc::new(MemoryIndex::new()),
            "absent",
        );
        let err = engine.retrieve("Dose", 3).await.unwrap_err();
        assert_eq!(err.kind(), "collection_missing");
    }
}
