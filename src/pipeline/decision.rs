//! Category decision engine
//!
//! Turns ranked neighbors into one category, a confidence in [0, 1] and
//! disposal instructions. Evidence below the confidence threshold still
//! yields the best-guess category, but the instructions lead with an explicit
//! uncertainty notice and the outcome is `LowConfidence`.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::{ClassificationConfig, DecisionStrategy};
use crate::stats::StatsTracker;
use crate::types::{Category, Decision, DecisionOutcome, NeighborMatch};

/// Instructions for UNKNOWN decisions.
pub const UNKNOWN_INSTRUCTIONS: &str =
    "Ich weiß nicht, wie man diesen Gegenstand entsorgt. Bitte offizielle Quellen konsultieren.";

const GENERIC_ENVIRONMENTAL_NOTE: &str = "Positive Umweltwirkung durch korrekte Entsorgung";

/// Short educational note per category.
pub fn environmental_note(category: Category) -> &'static str {
    match category {
        Category::Plastic => "Recycling spart Erdöl und reduziert Meeresverschmutzung",
        Category::Paper => "Recycling schützt Wälder und spart Wasser",
        Category::Glass => "Glasrecycling spart Energie und ist unendlich möglich",
        Category::Organic => "Kompostierung erzeugt nährstoffreiche Erde",
        Category::Hazardous => "Sichere Entsorgung schützt Grundwasser",
        Category::Residual => "Verbrennung mit Energiegewinnung möglich",
        Category::Unknown => GENERIC_ENVIRONMENTAL_NOTE,
    }
}

/// Instructions prefixed with the uncertainty notice.
pub fn low_confidence_instructions(score: f64, instructions: &str) -> String {
    format!(
        "Ich bin mir nicht ganz sicher (Score={score:.3}). Bitte lokale Entsorgungsstelle prüfen. \
         Vermutlich: {instructions}"
    )
}

pub struct DecisionEngine {
    top_k: usize,
    threshold: f64,
    strategy: DecisionStrategy,
    stats: Arc<StatsTracker>,
}

impl DecisionEngine {
    pub fn new(config: &ClassificationConfig, stats: Arc<StatsTracker>) -> Self {
        Self {
            top_k: config.top_k,
            threshold: config.min_score,
            strategy: config.strategy,
            stats,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn stats(&self) -> &Arc<StatsTracker> {
        &self.stats
    }

    /// Decide from the first `top_k` of `neighbors` and count the result in
    /// the stats tracker. Any order is accepted; the highest score wins.
    pub fn decide(&self, item_text: &str, neighbors: &[NeighborMatch]) -> Decision {
        let neighbors = &neighbors[..neighbors.len().min(self.top_k)];
        let decision = match self.pick(neighbors) {
            None => self.unknown(item_text, DecisionOutcome::NoMatch),
            Some((primary, confidence)) => {
                let (outcome, instructions) = if confidence < self.threshold {
                    (
                        DecisionOutcome::LowConfidence,
                        low_confidence_instructions(confidence, &primary.entry.instructions),
                    )
                } else {
                    (DecisionOutcome::Confident, primary.entry.instructions.clone())
                };
                let category = primary.entry.category;
                Decision {
                    item: item_text.to_string(),
                    category,
                    confidence,
                    instructions,
                    similar_items: neighbors
                        .iter()
                        .map(|n| n.entry.primary_example().unwrap_or_default().to_string())
                        .collect(),
                    environmental_note: environmental_note(category).to_string(),
                    outcome,
                }
            }
        };
        debug!(
            category = %decision.category,
            confidence = decision.confidence,
            outcome = ?decision.outcome,
            "Decision"
        );
        self.stats.record_decision(&decision);
        decision
    }

    /// UNKNOWN answer for a failed dependency, counted as such.
    pub fn degraded(&self, item_text: &str) -> Decision {
        let decision = self.unknown(item_text, DecisionOutcome::Degraded);
        self.stats.record_decision(&decision);
        decision
    }

    /// UNKNOWN answer for a description that never reached the provider.
    /// Counted as a query, not as a dependency failure.
    pub fn rejected(&self, item_text: &str) -> Decision {
        let decision = self.unknown(item_text, DecisionOutcome::Rejected);
        self.stats.record_decision(&decision);
        decision
    }

    fn unknown(&self, item_text: &str, outcome: DecisionOutcome) -> Decision {
        Decision {
            item: item_text.to_string(),
            category: Category::Unknown,
            confidence: 0.0,
            instructions: UNKNOWN_INSTRUCTIONS.to_string(),
            similar_items: Vec::new(),
            environmental_note: environmental_note(Category::Unknown).to_string(),
            outcome,
        }
    }

    /// Primary neighbor and its confidence under the configured strategy.
    fn pick<'a>(&self, neighbors: &'a [NeighborMatch]) -> Option<(&'a NeighborMatch, f64)> {
        if neighbors.is_empty() {
            return None;
        }
        match self.strategy {
            DecisionStrategy::NearestNeighbor => best_of(neighbors.iter()),
            DecisionStrategy::WeightedVote => weighted_vote(neighbors),
        }
    }
}

/// Similarity as a usable score: non-finite values count as 0.
fn score(n: &NeighborMatch) -> f64 {
    if n.similarity.is_finite() {
        n.similarity.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Highest-scoring neighbor; ties go to the earliest one.
fn best_of<'a>(
    neighbors: impl Iterator<Item = &'a NeighborMatch>,
) -> Option<(&'a NeighborMatch, f64)> {
    let mut best: Option<(&NeighborMatch, f64)> = None;
    for n in neighbors {
        let s = score(n);
        let better = match best {
            None => true,
            Some((_, top)) => s > top,
        };
        if better {
            best = Some((n, s));
        }
    }
    best
}

/// Similarity-weighted vote. The winning category's best neighbor is the
/// primary evidence and its score the confidence; equal totals go to the
/// category that appears first in rank order.
fn weighted_vote(neighbors: &[NeighborMatch]) -> Option<(&NeighborMatch, f64)> {
    let mut totals: HashMap<Category, (f64, usize)> = HashMap::new();
    for (rank, n) in neighbors.iter().enumerate() {
        let slot = totals.entry(n.entry.category).or_insert((0.0, rank));
        slot.0 += score(n);
    }

    let mut winner: Option<(Category, f64, usize)> = None;
    for (category, (total, first_rank)) in totals {
        let better = match winner {
            None => true,
            Some((_, best_total, best_rank)) => {
                total > best_total || (total == best_total && first_rank < best_rank)
            }
        };
        if better {
            winner = Some((category, total, first_rank));
        }
    }

    let (category, _, _) = winner?;
    best_of(neighbors.iter().filter(|n| n.entry.category == category))
}
