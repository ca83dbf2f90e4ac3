//! Classification decision and its wire profiles

use serde::{Deserialize, Serialize};

use super::Category;

/// How a decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    /// Best neighbor at or above the threshold
    Confident,
    /// Best neighbor below the threshold; category is a best guess
    LowConfidence,
    /// Index returned no neighbors
    NoMatch,
    /// Embedding provider or index failed; answered UNKNOWN
    Degraded,
    /// Description empty or over the input limit; answered UNKNOWN
    Rejected,
}

/// Result of classifying one item description.
///
/// Serializes as the standard profile. Use [`Decision::analytics`] for the
/// analytics field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub item: String,
    pub category: Category,
    /// Always within [0, 1]
    pub confidence: f64,
    pub instructions: String,
    /// Example items of the retrieved neighbors, similarity order, at most top_k.
    /// Empty strings mark neighbors without examples.
    pub similar_items: Vec<String>,
    pub environmental_note: String,
    pub outcome: DecisionOutcome,
}

impl Decision {
    pub fn is_low_confidence(&self) -> bool {
        self.outcome == DecisionOutcome::LowConfidence
    }

    pub fn is_unknown(&self) -> bool {
        self.category == Category::Unknown
    }

    pub fn analytics(&self) -> AnalyticsView<'_> {
        AnalyticsView {
            item: &self.item,
            predicted_category: self.category,
            confidence_score: self.confidence,
            disposal_instructions: &self.instructions,
            similar_items: &self.similar_items,
            environmental_impact: &self.environmental_note,
        }
    }
}

/// Analytics field naming of a [`Decision`] (`POST /analyze`).
#[derive(Debug, Serialize)]
pub struct AnalyticsView<'a> {
    pub item: &'a str,
    pub predicted_category: Category,
    pub confidence_score: f64,
    pub disposal_instructions: &'a str,
    pub similar_items: &'a [String],
    pub environmental_impact: &'a str,
}

/// Inbound classification request.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassificationRequest {
    pub item_description: String,
    /// Advisory only, not used in scoring
    #[serde(default)]
    pub user_location: Option<String>,
}
