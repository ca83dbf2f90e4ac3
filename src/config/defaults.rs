//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Classification
// ============================================================================

/// Number of neighbors requested from the similarity index.
pub const TOP_K: usize = 3;

/// Minimum similarity for a decision to be presented without an uncertainty notice.
pub const MIN_SCORE: f64 = 0.55;

/// Shortest description the interactive chat accepts.
pub const MIN_QUERY_CHARS: usize = 3;

// ============================================================================
// Embedding Provider
// ============================================================================

/// OpenAI-compatible API root.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Embedding model used for both ingestion and queries.
pub const EMBED_MODEL: &str = "text-embedding-3-small";

/// Texts per embedding request during ingestion.
pub const EMBED_BATCH_SIZE: usize = 32;

/// Longest input (characters) sent to the provider.
pub const MAX_INPUT_CHARS: usize = 8_000;

/// Dimensionality of the offline hashing embedder.
pub const HASHING_DIMENSIONS: usize = 256;

// ============================================================================
// Similarity Index
// ============================================================================

/// Qdrant REST endpoint.
pub const QDRANT_URL: &str = "http://localhost:6333";

/// Collection holding the knowledge base.
pub const COLLECTION: &str = "recycle_docs";

/// Points per upsert request.
pub const UPSERT_BATCH: usize = 64;

/// Probe text used to discover the provider's native dimensionality.
pub const DIMENSION_PROBE_TEXT: &str = "test-embedding-vector-dimension";

// ============================================================================
// Network
// ============================================================================

/// Per-attempt timeout for embedding and index requests (seconds).
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

/// TCP connect timeout (seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 8;

/// Retries after the first attempt for retryable failures.
pub const MAX_RETRIES: u32 = 3;

/// Base backoff between retries (milliseconds), doubled per attempt.
pub const BACKOFF_MS: u64 = 500;

/// Upper bound on a single backoff sleep (milliseconds).
pub const MAX_BACKOFF_MS: u64 = 10_000;

/// Hard ceiling on configured retries.
pub const MAX_RETRIES_CEILING: u32 = 10;

// ============================================================================
// Server / Storage
// ============================================================================

/// HTTP bind address.
pub const SERVER_ADDR: &str = "0.0.0.0:8080";

/// Sled directory for persisted stats counters.
pub const STATS_STORE_PATH: &str = "./data/stats";

/// Service name reported by the health endpoint.
pub const SERVICE_NAME: &str = "smart-recycle";
