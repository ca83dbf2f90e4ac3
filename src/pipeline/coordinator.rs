//! Classifier: retrieval + decision with graceful degradation
//!
//! Classification always answers. When the embedding provider or the
//! similarity index fails, the failure is logged at `warn`, counted as a
//! dependency failure and the caller receives an UNKNOWN decision. An empty
//! or oversized description is answered UNKNOWN with outcome `Rejected`.

use std::sync::Arc;
use tracing::{debug, warn};

use super::{DecisionEngine, RetrievalEngine};
use crate::config::ClassificationConfig;
use crate::embedding::EmbeddingProvider;
use crate::index::SimilarityIndex;
use crate::stats::StatsTracker;
use crate::types::{Decision, StatsSnapshot};

pub struct Classifier {
    retrieval: RetrievalEngine,
    decision: DecisionEngine,
}

impl Classifier {
    pub fn new(retrieval: RetrievalEngine, decision: DecisionEngine) -> Self {
        Self { retrieval, decision }
    }

    /// Wire both engines from shared collaborators.
    pub fn from_parts(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn SimilarityIndex>,
        collection: impl Into<String>,
        config: &ClassificationConfig,
        stats: Arc<StatsTracker>,
    ) -> Self {
        Self::new(
            RetrievalEngine::new(embedder, index, collection),
            DecisionEngine::new(config, stats),
        )
    }

    pub async fn classify(&self, item_text: &str) -> Decision {
        match self.retrieval.retrieve(item_text, self.decision.top_k()).await {
            Ok(neighbors) => self.decision.decide(item_text, &neighbors),
            Err(e) if e.is_invalid_input() => {
                debug!(kind = e.kind(), error = %e, "Description rejected");
                self.decision.rejected(item_text)
            }
            Err(e) => {
                warn!(
                    kind = e.kind(),
                    error = %e,
                    collection = self.retrieval.collection(),
                    "Classification degraded to UNKNOWN"
                );
                self.decision.degraded(item_text)
            }
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.decision.stats().snapshot()
    }

    pub fn stats_tracker(&self) -> &Arc<StatsTracker> {
        self.decision.stats()
    }

    pub fn index(&self) -> &Arc<dyn SimilarityIndex> {
        self.retrieval.index()
    }

    pub fn collection(&self) -> &str {
        self.retrieval.collection()
    }
}
