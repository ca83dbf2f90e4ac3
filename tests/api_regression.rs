//! API Regression Tests
//!
//! In-process tests that build the Axum app via `create_app()` and exercise
//! every endpoint using `tower::ServiceExt::oneshot()`.
//! No binary spawn, no network port.

use smart_recycle::api::{create_app, AppState};
use smart_recycle::config::ClassificationConfig;
use smart_recycle::embedding::{EmbeddingProvider, HashingEmbedder};
use smart_recycle::index::MemoryIndex;
use smart_recycle::{Classifier, KnowledgeBaseLoader, KnowledgeDataset, StatsTracker};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

async fn create_test_state() -> AppState {
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbedder::new(512, 8_000));
    let index = Arc::new(MemoryIndex::new());
    let classifier = Classifier::from_parts(
        embedder.clone(),
        index.clone(),
        "api_docs",
        &ClassificationConfig::default(),
        Arc::new(StatsTracker::new()),
    );
    let loader = KnowledgeBaseLoader::new(embedder, index, "api_docs", 32, false);
    loader
        .load(&KnowledgeDataset::builtin().entries())
        .await
        .unwrap();
    AppState::new(Arc::new(classifier), Arc::new(loader))
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// All GET endpoints should return 200.
#[tokio::test]
async fn test_get_endpoints_return_200() {
    let state = create_test_state().await;
    for endpoint in ["/", "/health", "/stats"] {
        let resp = create_app(state.clone()).oneshot(get(endpoint)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "{endpoint} should return 200");
    }
}

#[tokio::test]
async fn test_root_banner() {
    let app = create_app(create_test_state().await);
    let v = body_json(app.oneshot(get("/")).await.unwrap()).await;
    assert_eq!(v["message"], "♻️ Smart Recycle Bot Analytics API");
}

#[tokio::test]
async fn test_health_reports_memory_backend() {
    let app = create_app(create_test_state().await);
    let v = body_json(app.oneshot(get("/health")).await.unwrap()).await;
    assert_eq!(v["status"], "healthy");
    assert_eq!(v["index_backend"], "memory");
    assert_eq!(v["collection"], "api_docs");
}

#[tokio::test]
async fn test_analyze_uses_analytics_fields() {
    let app = create_app(create_test_state().await);
    let resp = app
        .oneshot(post_json("/analyze", r#"{"item_description":"Zeitung","user_location":"Berlin"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let v = body_json(resp).await;
    assert_eq!(v["item"], "Zeitung");
    assert_eq!(v["predicted_category"], "paper");
    assert!(v["confidence_score"].as_f64().unwrap() >= 0.55);
    assert!(v["disposal_instructions"].as_str().unwrap().contains("Blaue Tonne"));
    assert_eq!(v["environmental_impact"], "Recycling schützt Wälder und spart Wasser");
    assert!(v.get("category").is_none());
}

#[tokio::test]
async fn test_classify_uses_standard_fields() {
    let app = create_app(create_test_state().await);
    let resp = app
        .oneshot(post_json("/classify", r#"{"item_description":"Bananenschale"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let v = body_json(resp).await;
    assert_eq!(v["category"], "organic");
    assert_eq!(v["outcome"], "confident");
    let similar = v["similar_items"].as_array().unwrap();
    assert!(!similar.is_empty() && similar.len() <= 3);
}

#[tokio::test]
async fn test_empty_description_rejected() {
    let app = create_app(create_test_state().await);
    let resp = app
        .oneshot(post_json("/analyze", r#"{"item_description":""}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let v = body_json(resp).await;
    assert_eq!(v["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_oversized_description_rejected() {
    let state = create_test_state().await.with_max_input_chars(20);
    let body = format!(r#"{{"item_description":"{}"}}"#, "Plastikflasche ".repeat(3));
    let resp = create_app(state.clone()).oneshot(post_json("/classify", &body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let v = body_json(resp).await;
    assert_eq!(v["error"]["code"], "BAD_REQUEST");

    let v = body_json(create_app(state).oneshot(get("/stats")).await.unwrap()).await;
    assert_eq!(v["total_queries"], 0);
}

#[tokio::test]
async fn test_missing_field_rejected() {
    let app = create_app(create_test_state().await);
    let resp = app.oneshot(post_json("/classify", r#"{"item":"Dose"}"#)).await.unwrap();
    assert!(resp.status().is_client_error());
}

#[tokio::test]
async fn test_stats_count_classifications() {
    let state = create_test_state().await;
    for item in ["Plastikflasche", "Plastikflasche", "Zeitung"] {
        let body = format!(r#"{{"item_description":"{item}"}}"#);
        let resp = create_app(state.clone())
            .oneshot(post_json("/classify", &body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let v = body_json(create_app(state).oneshot(get("/stats")).await.unwrap()).await;
    assert_eq!(v["total_queries"], 3);
    assert_eq!(v["categories_breakdown"]["plastic"], 2);
    assert_eq!(v["categories_breakdown"]["paper"], 1);
    assert_eq!(v["recycling_rate"], 1.0);
}

#[tokio::test]
async fn test_ingest_item_then_classify() {
    let state = create_test_state().await;
    let resp = create_app(state.clone())
        .oneshot(post_json(
            "/ingest",
            r#"{"item":"Pizzakarton","category":"PAPER","instructions":"Sauberer Pizzakarton → Blaue Tonne."}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    assert_eq!(v["data"]["status"], "success");
    assert_eq!(v["data"]["report"]["written"], 1);

    let resp = create_app(state)
        .oneshot(post_json("/classify", r#"{"item_description":"Pizzakarton"}"#))
        .await
        .unwrap();
    let v = body_json(resp).await;
    assert_eq!(v["category"], "paper");
    assert_eq!(v["similar_items"][0], "Pizzakarton");
}

#[tokio::test]
async fn test_ingest_rejects_unknown_category() {
    let app = create_app(create_test_state().await);
    let resp = app
        .oneshot(post_json(
            "/ingest",
            r#"{"item":"Ding","category":"unknown","instructions":"?"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ingest_rejects_unparseable_category() {
    let app = create_app(create_test_state().await);
    let resp = app
        .oneshot(post_json(
            "/ingest",
            r#"{"item":"Ding","category":"metal","instructions":"Wertstoffhof"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
