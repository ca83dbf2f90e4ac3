//! API handlers
//!
//! Classification endpoints always answer with a decision; only malformed
//! requests are rejected.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::envelope::{ApiErrorResponse, ApiResponse};
use crate::config::defaults::{MAX_INPUT_CHARS, SERVICE_NAME};
use crate::embedding::{validate_input, EmbeddingError};
use crate::knowledge_base::{entry_for, IngestReport, KnowledgeBaseLoader};
use crate::pipeline::Classifier;
use crate::types::{Category, ClassificationRequest, Decision, StatsSnapshot};

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<Classifier>,
    pub loader: Arc<KnowledgeBaseLoader>,
    /// Serializes ingestion requests against the collection
    pub ingest_lock: Arc<Mutex<()>>,
    pub started_at: Instant,
    /// Longest accepted `item_description`, in characters
    pub max_input_chars: usize,
}

impl AppState {
    pub fn new(classifier: Arc<Classifier>, loader: Arc<KnowledgeBaseLoader>) -> Self {
        Self {
            classifier,
            loader,
            ingest_lock: Arc::new(Mutex::new(())),
            started_at: Instant::now(),
            max_input_chars: MAX_INPUT_CHARS,
        }
    }

    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }
}

// ============================================================================
// Service Endpoints
// ============================================================================

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    pub version: &'static str,
}

/// GET /
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "♻️ Smart Recycle Bot Analytics API",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded" (index unreachable)
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub index_backend: &'static str,
    pub index_healthy: bool,
    pub collection: String,
    pub uptime_seconds: u64,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let index = state.classifier.index();
    let index_healthy = index.health().await;
    Json(HealthResponse {
        status: if index_healthy { "healthy" } else { "degraded" },
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        index_backend: index.backend_name(),
        index_healthy,
        collection: state.classifier.collection().to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

// ============================================================================
// Classification Endpoints
// ============================================================================

async fn run_classification(state: &AppState, request: &ClassificationRequest) -> Result<Decision, Response> {
    let description = match validate_input(&request.item_description, state.max_input_chars) {
        Ok(text) => text,
        Err(EmbeddingError::EmptyInput) => {
            return Err(ApiErrorResponse::bad_request("item_description must not be empty"))
        }
        Err(e) => return Err(ApiErrorResponse::bad_request(format!("item_description: {e}"))),
    };
    Ok(state.classifier.classify(description).await)
}

/// POST /analyze - analytics field names
pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<ClassificationRequest>,
) -> Response {
    match run_classification(&state, &request).await {
        Ok(decision) => Json(decision.analytics()).into_response(),
        Err(resp) => resp,
    }
}

/// POST /classify - standard field names
pub async fn classify(
    State(state): State<AppState>,
    Json(request): Json<ClassificationRequest>,
) -> Response {
    match run_classification(&state, &request).await {
        Ok(decision) => Json(decision).into_response(),
        Err(resp) => resp,
    }
}

/// GET /stats
pub async fn stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.classifier.stats())
}

// ============================================================================
// Knowledge Contribution
// ============================================================================

/// Body of `POST /ingest`
#[derive(Debug, Deserialize)]
pub struct IngestItemRequest {
    pub item: String,
    pub category: String,
    pub instructions: String,
}

#[derive(Debug, Serialize)]
pub struct IngestItemResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub report: IngestReport,
}

/// POST /ingest - add one user-contributed item
pub async fn ingest_item(
    State(state): State<AppState>,
    Json(request): Json<IngestItemRequest>,
) -> Response {
    let category: Category = match request.category.parse() {
        Ok(c) => c,
        Err(e) => return ApiErrorResponse::bad_request(format!("{e}")),
    };
    if !category.is_disposal() {
        return ApiErrorResponse::bad_request("category UNKNOWN cannot be stored");
    }
    if request.item.trim().is_empty() || request.instructions.trim().is_empty() {
        return ApiErrorResponse::bad_request("item and instructions must not be empty");
    }

    let entry = entry_for(category, &request.item, &request.instructions);
    let _guard = state.ingest_lock.lock().await;
    match state.loader.ingest_item(entry).await {
        Ok(report) => {
            info!(item = %request.item, category = %category, "User contribution stored");
            ApiResponse::ok(IngestItemResponse {
                status: "success",
                message: "Item added to knowledge base",
                report,
            })
        }
        Err(e) => {
            warn!(error = %e, "User contribution failed");
            ApiErrorResponse::service_unavailable(format!("Ingest failed: {e}"))
        }
    }
}
