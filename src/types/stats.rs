//! Aggregate query statistics

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Category;

/// Point-in-time view of the stats tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Every recorded decision, UNKNOWN included
    pub total_queries: u64,
    /// Disposal categories only; UNKNOWN is counted in `unresolved`
    pub categories_breakdown: BTreeMap<Category, u64>,
    pub unresolved: u64,
    pub low_confidence: u64,
    pub dependency_failures: u64,
    /// Up to five categories, most frequent first
    pub most_common_categories: Vec<Category>,
    /// Non-residual, non-unknown share of `total_queries`; 0.0 when empty
    pub recycling_rate: f64,
}

impl StatsSnapshot {
    pub fn count(&self, category: Category) -> u64 {
        match category {
            Category::Unknown => self.unresolved,
            c => self.categories_breakdown.get(&c).copied().unwrap_or(0),
        }
    }
}
