//! Knowledge-base records and retrieval results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Category;

/// One knowledge-base record. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// Stable identifier; re-ingesting the same id overwrites instead of duplicating
    pub id: String,
    /// Canonical description
    pub text: String,
    pub category: Category,
    pub instructions: String,
    /// Example items in display order
    #[serde(default)]
    pub example_items: Vec<String>,
}

impl KnowledgeEntry {
    /// First example item, if any.
    pub fn primary_example(&self) -> Option<&str> {
        self.example_items.first().map(String::as_str)
    }
}

/// Where a stored point came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    RecyclingKnowledgeBase,
    UserContribution,
}

/// Payload written next to each vector in the similarity index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgePayload {
    #[serde(flatten)]
    pub entry: KnowledgeEntry,
    /// Text that was actually embedded
    pub content: String,
    /// Insertion ordinal, used to break similarity ties
    pub seq: u64,
    pub source: EntrySource,
    pub created_at: DateTime<Utc>,
}

/// A knowledge entry retrieved for a query.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborMatch {
    pub entry: KnowledgeEntry,
    /// Cosine similarity clamped to [0, 1], higher is closer
    pub similarity: f64,
}
