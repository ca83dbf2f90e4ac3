//! Knowledge-base ingestion: embed entries and upsert them into the index

use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use super::embedding_text;
use crate::config::defaults::DIMENSION_PROBE_TEXT;
use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::index::{IndexError, IndexPoint, SimilarityIndex};
use crate::types::{EntrySource, KnowledgeEntry, KnowledgePayload};

/// Ingestion failure. `written` entries reached the index before the error.
#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error("Ingestion stopped after {written}/{total} entries, embedding failed: {source}")]
    Embedding {
        written: usize,
        total: usize,
        #[source]
        source: EmbeddingError,
    },
    #[error("Ingestion stopped after {written}/{total} entries, index failed: {source}")]
    Index {
        written: usize,
        total: usize,
        #[source]
        source: IndexError,
    },
    #[error("Invalid knowledge entry '{0}': UNKNOWN cannot be stored")]
    InvalidEntry(String),
}

impl IngestionError {
    /// Entries written before the failure.
    pub fn written(&self) -> usize {
        match self {
            IngestionError::Embedding { written, .. } | IngestionError::Index { written, .. } => *written,
            IngestionError::InvalidEntry(_) => 0,
        }
    }

    pub fn total(&self) -> usize {
        match self {
            IngestionError::Embedding { total, .. } | IngestionError::Index { total, .. } => *total,
            IngestionError::InvalidEntry(_) => 0,
        }
    }
}

/// Result of a successful ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub written: usize,
    pub total: usize,
    pub collection: String,
}

/// Seeds the similarity index from knowledge entries.
///
/// Not safe to run concurrently with itself against the same collection;
/// callers serialize ingestion runs.
pub struct KnowledgeBaseLoader {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn SimilarityIndex>,
    collection: String,
    upsert_batch: usize,
    enrich: bool,
}

impl KnowledgeBaseLoader {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn SimilarityIndex>,
        collection: impl Into<String>,
        upsert_batch: usize,
        enrich: bool,
    ) -> Self {
        Self {
            embedder,
            index,
            collection: collection.into(),
            upsert_batch: upsert_batch.max(1),
            enrich,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Embed and upsert `entries` in batches. Entries sharing an id are
    /// written once; re-running with the same entries overwrites in place.
    pub async fn load(&self, entries: &[KnowledgeEntry]) -> Result<IngestReport, IngestionError> {
        self.write(entries, EntrySource::RecyclingKnowledgeBase, 0).await
    }

    /// Add a single user-contributed entry after the existing ones.
    pub async fn ingest_item(&self, entry: KnowledgeEntry) -> Result<IngestReport, IngestionError> {
        self.ensure_collection(1).await?;
        let seq = self
            .index
            .count(&self.collection)
            .await
            .map_err(|source| IngestionError::Index {
                written: 0,
                total: 1,
                source,
            })?;
        self.write(std::slice::from_ref(&entry), EntrySource::UserContribution, seq as u64)
            .await
    }

    async fn write(
        &self,
        entries: &[KnowledgeEntry],
        source: EntrySource,
        first_seq: u64,
    ) -> Result<IngestReport, IngestionError> {
        if let Some(bad) = entries.iter().find(|e| !e.category.is_disposal()) {
            return Err(IngestionError::InvalidEntry(bad.id.clone()));
        }

        let mut seen = HashSet::new();
        let unique: Vec<&KnowledgeEntry> = entries.iter().filter(|e| seen.insert(e.id.as_str())).collect();
        let total = unique.len();
        if total == 0 {
            return Ok(self.report(0, 0));
        }

        self.ensure_collection(total).await?;

        let created_at = Utc::now();
        let mut written = 0usize;
        for (batch_no, chunk) in unique.chunks(self.upsert_batch).enumerate() {
            let texts: Vec<String> = chunk.iter().map(|e| embedding_text(e, self.enrich)).collect();
            let vectors = self
                .embedder
                .embed_batch(&texts)
                .await
                .map_err(|source| IngestionError::Embedding { written, total, source })?;

            let base = batch_no * self.upsert_batch;
            let points: Vec<IndexPoint> = chunk
                .iter()
                .zip(texts)
                .zip(vectors)
                .enumerate()
                .map(|(i, ((entry, content), vector))| IndexPoint {
                    vector,
                    payload: KnowledgePayload {
                        entry: (*entry).clone(),
                        content,
                        seq: first_seq + (base + i) as u64,
                        source,
                        created_at,
                    },
                })
                .collect();

            self.index
                .upsert(&self.collection, &points)
                .await
                .map_err(|source| IngestionError::Index { written, total, source })?;
            written += points.len();
        }

        if let Err(e) = self.embedder.persist().await {
            warn!(error = %e, "Embedding cache not persisted");
        }

        info!(collection = %self.collection, written, total, "Ingest completed");
        Ok(self.report(written, total))
    }

    /// Create the collection if missing, probing the provider's dimension
    /// when it is not known up front.
    async fn ensure_collection(&self, total: usize) -> Result<(), IngestionError> {
        let dimension = match self.embedder.dimension() {
            Some(d) => d,
            None => self
                .embedder
                .embed(DIMENSION_PROBE_TEXT)
                .await
                .map_err(|source| IngestionError::Embedding { written: 0, total, source })?
                .len(),
        };
        self.index
            .ensure_collection(&self.collection, dimension)
            .await
            .map_err(|source| IngestionError::Index { written: 0, total, source })
    }

    fn report(&self, written: usize, total: usize) -> IngestReport {
        IngestReport {
            written,
            total,
            collection: self.collection.clone(),
        }
    }
}
