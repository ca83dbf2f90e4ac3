//! API route definitions
//!
//! - GET  /          - service banner
//! - GET  /health    - service and index health
//! - POST /analyze   - classify, analytics profile
//! - POST /classify  - classify, standard profile
//! - GET  /stats     - aggregate counters
//! - POST /ingest    - add one knowledge entry

use axum::{routing::{get, post}, Router};

use super::handlers::{self, AppState};

pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/analyze", post(handlers::analyze))
        .route("/classify", post(handlers::classify))
        .route("/stats", get(handlers::stats))
        .route("/ingest", post(handlers::ingest_item))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassificationConfig;
    use crate::embedding::HashingEmbedder;
    use crate::index::MemoryIndex;
    use crate::knowledge_base::KnowledgeBaseLoader;
    use crate::pipeline::Classifier;
    use crate::stats::StatsTracker;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn create_test_state() -> AppState {
        let embedder = Arc::new(HashingEmbedder::new(64, 8_000));
        let index = Arc::new(MemoryIndex::new());
        let classifier = Classifier::from_parts(
            embedder.clone(),
            index.clone(),
            "test_docs",
            &ClassificationConfig::default(),
            Arc::new(StatsTracker::new()),
        );
        let loader = KnowledgeBaseLoader::new(embedder, index, "test_docs", 8, false);
        AppState::new(Arc::new(classifier), Arc::new(loader))
    }

    #[tokio::test]
    async fn test_api_routes_root() {
        let app = api_routes(create_test_state());
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_routes_health() {
        let app = api_routes(create_test_state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_routes_empty_description_rejected() {
        let app = api_routes(create_test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/classify")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"item_description":"   "}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_api_routes_cold_index_answers_unknown() {
        let app = api_routes(create_test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/analyze")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"item_description":"Zeitung"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["predicted_category"], "unknown");
        assert_eq!(v["confidence_score"], 0.0);
    }
}
