//! Memoizing embedding wrapper with an optional JSON cache file

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{Embedding, EmbeddingError, EmbeddingProvider};

/// Caches vectors by trimmed input text. Only batch (ingestion) texts are
/// stored; single queries read the cache but are never added to it, so query
/// text never reaches the cache file. The file format is a flat JSON object
/// `{ "text": [f32, ...] }`.
pub struct CachedEmbedder<P> {
    inner: P,
    cache: DashMap<String, Embedding>,
    cache_file: Option<PathBuf>,
}

impl<P: EmbeddingProvider> CachedEmbedder<P> {
    /// Wrap `inner`; an unreadable cache file is logged and ignored.
    pub fn new(inner: P, cache_file: Option<PathBuf>) -> Self {
        let mut cache = DashMap::new();
        if let Some(path) = cache_file.as_deref() {
            match load_cache_file(path) {
                Ok(entries) => {
                    info!(path = %path.display(), entries = entries.len(), "Loaded embedding cache");
                    cache.extend(entries);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Ignoring unreadable embedding cache"),
            }
        }
        Self {
            inner,
            cache,
            cache_file,
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

fn load_cache_file(path: &Path) -> std::io::Result<HashMap<String, Embedding>> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

#[async_trait]
impl<P: EmbeddingProvider> EmbeddingProvider for CachedEmbedder<P> {
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        if let Some(hit) = self.cache.get(text.trim()) {
            return Ok(hit.value().clone());
        }
        self.inner.embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        let mut out: Vec<Option<Embedding>> = Vec::with_capacity(texts.len());
        let mut missing: Vec<String> = Vec::new();
        let mut missing_at: Vec<usize> = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            match self.cache.get(text.trim()) {
                Some(hit) => out.push(Some(hit.value().clone())),
                None => {
                    out.push(None);
                    missing.push(text.clone());
                    missing_at.push(i);
                }
            }
        }

        if !missing.is_empty() {
            debug!(cached = texts.len() - missing.len(), requested = missing.len(), "Embedding batch");
            let vectors = self.inner.embed_batch(&missing).await?;
            for ((slot, text), vector) in missing_at.into_iter().zip(&missing).zip(vectors) {
                self.cache.insert(text.trim().to_string(), vector.clone());
                out[slot] = Some(vector);
            }
        }

        out.into_iter()
            .map(|v| v.ok_or_else(|| EmbeddingError::Malformed("provider returned too few embeddings".into())))
            .collect()
    }

    fn dimension(&self) -> Option<usize> {
        self.inner.dimension()
    }

    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    /// Write the cache file (best effort at the call site).
    async fn persist(&self) -> Result<(), EmbeddingError> {
        let Some(path) = self.cache_file.as_deref() else {
            return Ok(());
        };
        let snapshot: HashMap<String, Embedding> = self
            .cache
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let json = serde_json::to_vec(&snapshot).map_err(|e| EmbeddingError::Malformed(e.to_string()))?;

        let tmp = path.with_extension("json.tmp");
        let write = async {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&tmp, &json).await?;
            tokio::fs::rename(&tmp, path).await
        };
        if let Err(e) = write.await {
            warn!(path = %path.display(), error = %e, "Could not save embedding cache");
            return Ok(());
        }
        debug!(path = %path.display(), entries = snapshot.len(), "Saved embedding cache");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32, 1.0])
        }

        fn dimension(&self) -> Option<usize> {
            Some(2)
        }

        fn provider_name(&self) -> &str {
            "counting"
        }
    }

    fn counting() -> CountingEmbedder {
        CountingEmbedder {
            calls: AtomicUsize::new(0),
        }
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn test_query_reads_ingested_vector() {
        let cached = CachedEmbedder::new(counting(), None);
        let ingested = cached.embed_batch(&texts(&["Dose"])).await.unwrap();
        let queried = cached.embed("  Dose ").await.unwrap();
        assert_eq!(ingested[0], queried);
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_queries_are_not_cached() {
        let cached = CachedEmbedder::new(counting(), None);
        cached.embed_batch(&texts(&["Zeitung", "Karton"])).await.unwrap();

        for query in ["alte Zeitung", "Pizzakarton", "alte Zeitung"] {
            cached.embed(query).await.unwrap();
        }
        assert_eq!(cached.len(), 2);
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_batch_only_requests_missing() {
        let cached = CachedEmbedder::new(counting(), None);
        cached.embed_batch(&texts(&["Glas"])).await.unwrap();
        let vectors = cached.embed_batch(&texts(&["Glas", "Papier", "Dose"])).await.unwrap();
        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[1], vec![6.0, 1.0]);
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 3);
        assert_eq!(cached.len(), 3);
    }

    #[tokio::test]
    async fn test_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let cached = CachedEmbedder::new(counting(), Some(path.clone()));
        cached.embed_batch(&texts(&["Karton"])).await.unwrap();
        cached.embed("Joghurtbecher aus Plastik").await.unwrap();
        cached.persist().await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("Joghurtbecher"));

        let reloaded = CachedEmbedder::new(counting(), Some(path));
        assert_eq!(reloaded.len(), 1);
        reloaded.embed("Karton").await.unwrap();
        assert_eq!(reloaded.inner().calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_corrupt_cache_file_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "not json").unwrap();
        let cached = CachedEmbedder::new(counting(), Some(path));
        assert!(cached.is_empty());
    }
}
