//! Knowledge base: the static dataset and its ingestion into the index
//!
//! - `dataset`: typed per-category records (built-in or TOML file)
//! - `enrichment`: the text actually embedded for each entry
//! - `loader`: batch embedding + upsert with partial-success reporting

mod dataset;
mod enrichment;
mod loader;

pub use dataset::{entry_for, slugify, CategoryRecord, DatasetError, KnowledgeDataset};
pub use enrichment::embedding_text;
pub use loader::{IngestReport, IngestionError, KnowledgeBaseLoader};
