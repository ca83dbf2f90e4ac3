//! Sled persistence for stats counters
//!
//! Keys are `category:<name>`, `low_confidence` and `dependency_failures`;
//! values are big-endian u64. Counters are restored once at startup and
//! written back at shutdown.

use std::path::Path;
use std::sync::Arc;

use super::Counters;
use crate::types::Category;

const CATEGORY_PREFIX: &str = "category:";
const LOW_CONFIDENCE_KEY: &str = "low_confidence";
const DEPENDENCY_FAILURES_KEY: &str = "dependency_failures";

#[derive(Debug, thiserror::Error)]
pub enum StatsStoreError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
    #[error("Corrupt counter '{0}'")]
    Corrupt(String),
}

#[derive(Clone)]
pub struct StatsStore {
    db: Arc<sled::Db>,
}

impl StatsStore {
    /// Open or create the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StatsStoreError> {
        let db = sled::open(path)?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Stored counters; an empty store yields zeroes. Unknown category keys
    /// are skipped.
    pub fn load(&self) -> Result<Counters, StatsStoreError> {
        let mut counters = Counters::default();
        for item in self.db.iter() {
            let (key, value) = item?;
            let key = String::from_utf8_lossy(&key).into_owned();
            let bytes = <[u8; 8]>::try_from(&value[..])
                .map_err(|_| StatsStoreError::Corrupt(key.clone()))?;
            let n = u64::from_be_bytes(bytes);

            if let Some(name) = key.strip_prefix(CATEGORY_PREFIX) {
                if let Ok(category) = name.parse::<Category>() {
                    counters.categories.insert(category, n);
                }
            } else if key == LOW_CONFIDENCE_KEY {
                counters.low_confidence = n;
            } else if key == DEPENDENCY_FAILURES_KEY {
                counters.dependency_failures = n;
            }
        }
        Ok(counters)
    }

    /// Overwrite stored counters and flush to disk.
    pub async fn save(&self, counters: &Counters) -> Result<(), StatsStoreError> {
        let mut batch = sled::Batch::default();
        for (category, n) in &counters.categories {
            batch.insert(
                format!("{CATEGORY_PREFIX}{}", category.as_str()).as_bytes(),
                n.to_be_bytes().to_vec(),
            );
        }
        batch.insert(LOW_CONFIDENCE_KEY.as_bytes(), counters.low_confidence.to_be_bytes().to_vec());
        batch.insert(
            DEPENDENCY_FAILURES_KEY.as_bytes(),
            counters.dependency_failures.to_be_bytes().to_vec(),
        );
        self.db.apply_batch(batch)?;
        self.db.flush_async().await?;
        Ok(())
    }
}
