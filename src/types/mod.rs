//! Shared data structures for the classification pipeline
//!
//! - `Category`: closed set of waste categories
//! - `KnowledgeEntry` / `KnowledgePayload`: knowledge-base records and what the index stores
//! - `NeighborMatch`: one retrieved entry with its similarity
//! - `Decision`: classifier output, with standard and analytics profiles
//! - `StatsSnapshot`: aggregate counters

mod category;
mod decision;
mod knowledge;
mod stats;

pub use category::*;
pub use decision::*;
pub use knowledge::*;
pub use stats::*;
