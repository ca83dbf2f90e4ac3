//! Service settings - every tunable of the classification core as TOML values
//!
//! Each struct implements `Default` with the values the service shipped with,
//! so running without a config file behaves exactly like the original
//! environment-only deployment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::defaults;
use crate::retry::RetryPolicy;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "SMART_RECYCLE_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "smart_recycle.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a deployment.
///
/// Load with `Settings::load()` which searches:
/// 1. `$SMART_RECYCLE_CONFIG`
/// 2. `./smart_recycle.toml`
/// 3. Built-in defaults
///
/// and then applies environment overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Embedding provider
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Similarity index
    #[serde(default)]
    pub index: IndexConfig,

    /// Timeouts and retry budget for every external call
    #[serde(default)]
    pub network: NetworkConfig,

    /// Retrieval and decision tuning
    #[serde(default)]
    pub classification: ClassificationConfig,

    /// Knowledge base source and embedding-text style
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Stats persistence
    #[serde(default)]
    pub stats: StatsConfig,

    /// HTTP server
    #[serde(default)]
    pub server: ServerConfig,
}

impl Settings {
    /// Load configuration using the standard search order, then apply
    /// environment overrides.
    pub fn load() -> Self {
        let mut settings = Self::load_file_or_default();
        settings.apply_overrides(|key| std::env::var(key).ok());
        if let Err(e) = settings.validate() {
            warn!(error = %e, "Settings invalid after environment overrides, using defaults");
            let mut fallback = Self::default();
            fallback.apply_secrets(|key| std::env::var(key).ok());
            return fallback;
        }
        settings
    }

    fn load_file_or_default() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(settings) => {
                        info!(path = %p.display(), "Loaded settings from {}", CONFIG_ENV_VAR);
                        return settings;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load settings from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        // 2. Check ./smart_recycle.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(settings) => {
                    info!("Loaded settings from ./{}", LOCAL_CONFIG_FILE);
                    return settings;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        // 3. Defaults
        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::ParseStr(e) => ConfigError::Parse(path.to_path_buf(), e),
            other => other,
        })
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(contents).map_err(ConfigError::ParseStr)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serialize the current settings to a TOML string. Secrets are never written.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Apply the original deployment's environment variables on top of the
    /// loaded values. Unparseable numbers are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.apply_secrets(&lookup);

        if let Some(v) = lookup("OPENAI_BASE_URL") {
            self.embedding.base_url = v;
        }
        if let Some(v) = lookup("EMBED_MODEL") {
            self.embedding.model = v;
        }
        if let Some(v) = lookup("EMBED_CACHE_FILE") {
            self.embedding.cache_file = (!v.is_empty()).then(|| PathBuf::from(v));
        }
        if let Some(v) = lookup("QDRANT_URL") {
            self.index.url = v;
        }
        if let Some(v) = lookup("QDRANT_COLLECTION") {
            self.index.collection = v;
        }
        if let Some(v) = lookup("SMART_RECYCLE_ADDR") {
            self.server.addr = v;
        }

        override_parsed(&lookup, "TOP_K", &mut self.classification.top_k);
        override_parsed(&lookup, "MIN_SCORE", &mut self.classification.min_score);
        override_parsed(&lookup, "BATCH_SIZE", &mut self.embedding.batch_size);
        override_parsed(&lookup, "UPSERT_BATCH", &mut self.index.upsert_batch);
        override_parsed(&lookup, "REQUEST_TIMEOUT", &mut self.network.timeout_secs);
    }

    fn apply_secrets<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("OPENAI_API_KEY") {
            self.embedding.api_key = (!v.is_empty()).then_some(v);
        }
        if let Some(v) = lookup("QDRANT_API_KEY") {
            self.index.api_key = (!v.is_empty()).then_some(v);
        }
    }

    /// Validate all values for internal consistency, collecting every problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let c = &self.classification;
        if c.top_k == 0 {
            errors.push("classification.top_k must be > 0".to_string());
        }
        if !c.min_score.is_finite() || !(0.0..=1.0).contains(&c.min_score) {
            errors.push(format!(
                "classification.min_score must be within [0, 1], got {}",
                c.min_score
            ));
        }

        let e = &self.embedding;
        if e.batch_size == 0 {
            errors.push("embedding.batch_size must be > 0".to_string());
        }
        if e.max_input_chars == 0 {
            errors.push("embedding.max_input_chars must be > 0".to_string());
        }
        if e.dimensions == 0 {
            errors.push("embedding.dimensions must be > 0".to_string());
        }
        if e.model.trim().is_empty() {
            errors.push("embedding.model must not be empty".to_string());
        }

        let i = &self.index;
        if i.upsert_batch == 0 {
            errors.push("index.upsert_batch must be > 0".to_string());
        }
        if i.collection.trim().is_empty() {
            errors.push("index.collection must not be empty".to_string());
        }

        let n = &self.network;
        if n.timeout_secs == 0 {
            errors.push("network.timeout_secs must be > 0".to_string());
        }
        if n.connect_timeout_secs == 0 {
            errors.push("network.connect_timeout_secs must be > 0".to_string());
        }
        if n.max_retries > defaults::MAX_RETRIES_CEILING {
            errors.push(format!(
                "network.max_retries must be <= {}, got {}",
                defaults::MAX_RETRIES_CEILING,
                n.max_retries
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse::<T>() {
            Ok(v) => *target = v,
            Err(_) => warn!(key, value = %raw, "Ignoring unparseable environment override"),
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, std::io::Error),
    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, toml::de::Error),
    #[error("Config parse error: {0}")]
    ParseStr(toml::de::Error),
    #[error("Config serialization error: {0}")]
    Serialize(toml::ser::Error),
    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Embedding
// ============================================================================

/// Which embedding provider backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    /// OpenAI-compatible `/embeddings` endpoint
    #[default]
    #[serde(alias = "openai")]
    OpenAi,
    /// Deterministic offline feature hashing
    Hashing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingBackend,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Read from `OPENAI_API_KEY`; never serialized.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Output size of the hashing provider (ignored by the remote provider)
    #[serde(default = "default_hashing_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_embed_batch")]
    pub batch_size: usize,

    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// JSON file holding cached vectors between runs
    #[serde(default)]
    pub cache_file: Option<PathBuf>,
}

fn default_base_url() -> String {
    defaults::OPENAI_BASE_URL.to_string()
}
fn default_model() -> String {
    defaults::EMBED_MODEL.to_string()
}
fn default_hashing_dimensions() -> usize {
    defaults::HASHING_DIMENSIONS
}
fn default_embed_batch() -> usize {
    defaults::EMBED_BATCH_SIZE
}
fn default_max_input_chars() -> usize {
    defaults::MAX_INPUT_CHARS
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::default(),
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            dimensions: default_hashing_dimensions(),
            batch_size: default_embed_batch(),
            max_input_chars: default_max_input_chars(),
            cache_file: None,
        }
    }
}

// ============================================================================
// Similarity Index
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexBackend {
    #[default]
    Qdrant,
    /// In-process cosine index (lost on restart)
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub backend: IndexBackend,

    #[serde(default = "default_qdrant_url")]
    pub url: String,

    /// Read from `QDRANT_API_KEY`; never serialized.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default = "default_upsert_batch")]
    pub upsert_batch: usize,
}

fn default_qdrant_url() -> String {
    defaults::QDRANT_URL.to_string()
}
fn default_collection() -> String {
    defaults::COLLECTION.to_string()
}
fn default_upsert_batch() -> usize {
    defaults::UPSERT_BATCH
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::default(),
            url: default_qdrant_url(),
            api_key: None,
            collection: default_collection(),
            upsert_batch: default_upsert_batch(),
        }
    }
}

// ============================================================================
// Network
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Per-attempt request timeout (seconds)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff (milliseconds), doubled per retry
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_timeout() -> u64 {
    defaults::REQUEST_TIMEOUT_SECS
}
fn default_connect_timeout() -> u64 {
    defaults::CONNECT_TIMEOUT_SECS
}
fn default_max_retries() -> u32 {
    defaults::MAX_RETRIES
}
fn default_backoff_ms() -> u64 {
    defaults::BACKOFF_MS
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl NetworkConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            // Outer guard sits slightly above the HTTP client's own timeout.
            attempt_timeout: self.request_timeout() + self.connect_timeout(),
            base_backoff: Duration::from_millis(self.backoff_ms),
        }
    }
}

// ============================================================================
// Classification
// ============================================================================

/// How retrieved neighbors are aggregated into one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStrategy {
    /// The single most similar neighbor decides
    #[default]
    #[serde(alias = "nearest")]
    NearestNeighbor,
    /// Similarity-weighted vote over all retrieved neighbors
    WeightedVote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Confidence threshold T
    #[serde(default = "default_min_score")]
    pub min_score: f64,

    #[serde(default)]
    pub strategy: DecisionStrategy,
}

fn default_top_k() -> usize {
    defaults::TOP_K
}
fn default_min_score() -> f64 {
    defaults::MIN_SCORE
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: default_min_score(),
            strategy: DecisionStrategy::default(),
        }
    }
}

// ============================================================================
// Knowledge Base
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Embed a synonym/reasoning-enriched text instead of the bare example.
    /// Unset: on for the OpenAI backend, off for hashing.
    #[serde(default)]
    pub enrich_embedding_text: Option<bool>,

    /// TOML dataset replacing the built-in one
    #[serde(default)]
    pub dataset_file: Option<PathBuf>,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            enrich_embedding_text: None,
            dataset_file: None,
        }
    }
}

impl KnowledgeConfig {
    /// Whether ingestion embeds enriched text for `backend`. Hashing vectors
    /// only match on shared words and trigrams, so the extra text dilutes them.
    pub fn enrich_for(&self, backend: EmbeddingBackend) -> bool {
        self.enrich_embedding_text
            .unwrap_or(backend == EmbeddingBackend::OpenAi)
    }
}

// ============================================================================
// Stats / Server
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Sled directory for counters; `None` keeps them in memory only
    #[serde(default = "default_stats_path")]
    pub store_path: Option<PathBuf>,
}

fn default_stats_path() -> Option<PathBuf> {
    Some(PathBuf::from(defaults::STATS_STORE_PATH))
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            store_path: default_stats_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
}

fn default_addr() -> String {
    defaults::SERVER_ADDR.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { addr: default_addr() }
    }
}
