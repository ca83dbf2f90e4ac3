//! In-memory query counters

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::types::{Category, Decision, DecisionOutcome, StatsSnapshot};

/// Number of categories listed in `most_common_categories`.
const MOST_COMMON_LIMIT: usize = 5;

/// Raw counter values, the unit of persistence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    /// Per category, UNKNOWN included
    pub categories: BTreeMap<Category, u64>,
    pub low_confidence: u64,
    pub dependency_failures: u64,
}

/// Process-scoped stats. Every update and read takes one lock, so concurrent
/// requests never lose increments.
#[derive(Debug, Default)]
pub struct StatsTracker {
    counters: Mutex<Counters>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from previously persisted counters.
    pub fn with_counters(counters: Counters) -> Self {
        Self {
            counters: Mutex::new(counters),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count one decision for `category`. UNKNOWN lands in `unresolved`.
    pub fn record(&self, category: Category) {
        *self.lock().categories.entry(category).or_insert(0) += 1;
    }

    /// Count a decision together with its outcome flags.
    pub fn record_decision(&self, decision: &Decision) {
        let mut c = self.lock();
        *c.categories.entry(decision.category).or_insert(0) += 1;
        match decision.outcome {
            DecisionOutcome::LowConfidence => c.low_confidence += 1,
            DecisionOutcome::Degraded => c.dependency_failures += 1,
            DecisionOutcome::Confident | DecisionOutcome::NoMatch | DecisionOutcome::Rejected => {}
        }
    }

    pub fn counters(&self) -> Counters {
        self.lock().clone()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        snapshot_of(&self.lock())
    }
}

fn snapshot_of(c: &Counters) -> StatsSnapshot {
    let total_queries: u64 = c.categories.values().sum();
    let unresolved = c.categories.get(&Category::Unknown).copied().unwrap_or(0);

    let categories_breakdown: BTreeMap<Category, u64> = c
        .categories
        .iter()
        .filter(|(cat, n)| cat.is_disposal() && **n > 0)
        .map(|(cat, n)| (*cat, *n))
        .collect();

    let recycled: u64 = categories_breakdown
        .iter()
        .filter(|(cat, _)| cat.is_recycled())
        .map(|(_, n)| n)
        .sum();
    let recycling_rate = if total_queries == 0 {
        0.0
    } else {
        recycled as f64 / total_queries as f64
    };

    let mut ranked: Vec<(Category, u64)> = categories_breakdown.iter().map(|(c, n)| (*c, *n)).collect();
    // Stable: equal counts keep category order
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    let most_common_categories = ranked
        .into_iter()
        .take(MOST_COMMON_LIMIT)
        .map(|(c, _)| c)
        .collect();

    StatsSnapshot {
        total_queries,
        categories_breakdown,
        unresolved,
        low_confidence: c.low_confidence,
        dependency_failures: c.dependency_failures,
        most_common_categories,
        recycling_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_plastic_plastic_paper() {
        let tracker = StatsTracker::new();
        tracker.record(Category::Plastic);
        tracker.record(Category::Plastic);
        tracker.record(Category::Paper);

        let snap = tracker.snapshot();
        assert_eq!(snap.count(Category::Plastic), 2);
        assert_eq!(snap.count(Category::Paper), 1);
        assert_eq!(snap.total_queries, 3);
        assert!((snap.recycling_rate - 1.0).abs() < f64::EPSILON);
        assert_eq!(snap.most_common_categories, vec![Category::Plastic, Category::Paper]);
    }

    #[test]
    fn test_empty_rate_is_zero() {
        let snap = StatsTracker::new().snapshot();
        assert_eq!(snap.total_queries, 0);
        assert_eq!(snap.recycling_rate, 0.0);
        assert!(snap.categories_breakdown.is_empty());
    }

    #[test]
    fn test_unknown_and_residual_excluded_from_rate() {
        let tracker = StatsTracker::new();
        tracker.record(Category::Glass);
        tracker.record(Category::Residual);
        tracker.record(Category::Unknown);
        tracker.record(Category::Unknown);

        let snap = tracker.snapshot();
        assert_eq!(snap.total_queries, 4);
        assert_eq!(snap.unresolved, 2);
        assert!(!snap.categories_breakdown.contains_key(&Category::Unknown));
        assert!((snap.recycling_rate - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_concurrent_records_not_lost() {
        let tracker = Arc::new(StatsTracker::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let t = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        t.record(Category::Organic);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(tracker.snapshot().count(Category::Organic), 8_000);
    }

    #[test]
    fn test_restore_from_counters() {
        let tracker = StatsTracker::new();
        tracker.record(Category::Hazardous);
        let restored = StatsTracker::with_counters(tracker.counters());
        assert_eq!(restored.snapshot().count(Category::Hazardous), 1);
    }
}
