//! In-process cosine index
//!
//! Exhaustive search over every stored point. Replacing a point keeps its
//! original position, so insertion order stays stable across re-ingestion.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::{cosine_similarity, IndexError, IndexPoint, ScoredPayload, SimilarityIndex};
use crate::embedding::Embedding;
use crate::types::KnowledgePayload;

#[derive(Debug)]
struct Collection {
    dimension: usize,
    points: Vec<(String, Embedding, KnowledgePayload)>,
}

#[derive(Debug, Default)]
pub struct MemoryIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SimilarityIndex for MemoryIndex {
    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Result<(), IndexError> {
        let mut collections = self.collections.write().unwrap_or_else(PoisonError::into_inner);
        match collections.get(collection) {
            Some(existing) if existing.dimension != dimension => Err(IndexError::DimensionMismatch {
                expected: existing.dimension,
                actual: dimension,
            }),
            Some(_) => Ok(()),
            None => {
                collections.insert(
                    collection.to_string(),
                    Collection {
                        dimension,
                        points: Vec::new(),
                    },
                );
                Ok(())
            }
        }
    }

    async fn upsert(&self, collection: &str, points: &[IndexPoint]) -> Result<(), IndexError> {
        let mut collections = self.collections.write().unwrap_or_else(PoisonError::into_inner);
        let coll = collections
            .get_mut(collection)
            .ok_or_else(|| IndexError::CollectionMissing(collection.to_string()))?;

        if let Some(bad) = points.iter().find(|p| p.vector.len() != coll.dimension) {
            return Err(IndexError::DimensionMismatch {
                expected: coll.dimension,
                actual: bad.vector.len(),
            });
        }

        for point in points {
            let id = &point.payload.entry.id;
            match coll.points.iter_mut().find(|(existing, _, _)| existing == id) {
                Some(slot) => {
                    slot.1 = point.vector.clone();
                    slot.2 = point.payload.clone();
                }
                None => coll
                    .points
                    .push((id.clone(), point.vector.clone(), point.payload.clone())),
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredPayload>, IndexError> {
        let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        let coll = collections
            .get(collection)
            .ok_or_else(|| IndexError::CollectionMissing(collection.to_string()))?;

        if vector.len() != coll.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: coll.dimension,
                actual: vector.len(),
            });
        }

        let mut hits: Vec<ScoredPayload> = coll
            .points
            .iter()
            .map(|(_, v, payload)| ScoredPayload {
                payload: payload.clone(),
                score: cosine_similarity(vector, v),
            })
            .collect();
        // Stable sort: equal scores keep insertion order
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn count(&self, collection: &str) -> Result<usize, IndexError> {
        let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        collections
            .get(collection)
            .map(|c| c.points.len())
            .ok_or_else(|| IndexError::CollectionMissing(collection.to_string()))
    }

    async fn health(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
