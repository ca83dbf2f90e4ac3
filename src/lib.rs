//! Smart Recycle: retrieval-augmented waste classification
//!
//! Classifies a free-text item description into a disposal category by
//! embedding it, searching a similarity index seeded from a recycling
//! knowledge base and turning the nearest neighbors into a decision.
//!
//! ## Architecture
//!
//! - **Embedding**: text → vector (OpenAI-compatible API or offline hashing)
//! - **Index**: cosine top-K search (Qdrant REST or in-memory)
//! - **Knowledge base**: dataset, embedding-text enrichment, ingestion
//! - **Pipeline**: retrieval + decision with threshold fallback
//! - **Stats**: per-category counters, optionally persisted with sled
//! - **API**: axum router over the classifier

pub mod api;
pub mod config;
pub mod embedding;
pub mod index;
pub mod knowledge_base;
pub mod pipeline;
pub mod retry;
pub mod stats;
pub mod types;

pub use config::Settings;

pub use types::{
    Category, ClassificationRequest, Decision, DecisionOutcome, KnowledgeEntry, NeighborMatch,
    StatsSnapshot,
};

pub use embedding::{EmbeddingError, EmbeddingProvider};
pub use index::{IndexError, SimilarityIndex};
pub use knowledge_base::{IngestReport, IngestionError, KnowledgeBaseLoader, KnowledgeDataset};
pub use pipeline::{Classifier, DecisionEngine, RetrievalEngine, RetrievalError};
pub use stats::{StatsStore, StatsTracker};
