//! Classification pipeline
//!
//! ```text
//! query text
//!   → RetrievalEngine   (embed → similarity search → ranked neighbors)
//!   → DecisionEngine    (category, confidence, instructions, notes)
//!   → StatsTracker      (counters)
//!   → Decision
//! ```
//!
//! `Classifier` runs both stages and turns dependency failures into an
//! UNKNOWN decision instead of an error.

mod coordinator;
mod decision;
mod retrieval;

pub use coordinator::Classifier;
pub use decision::{environmental_note, low_confidence_instructions, DecisionEngine, UNKNOWN_INSTRUCTIONS};
pub use retrieval::{RetrievalEngine, RetrievalError};
