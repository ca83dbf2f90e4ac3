//! Query statistics
//!
//! `StatsTracker` holds the counters for the life of the process;
//! `StatsStore` optionally carries them across restarts.

mod store;
mod tracker;

pub use store::{StatsStore, StatsStoreError};
pub use tracker::{Counters, StatsTracker};
