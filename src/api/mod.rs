//! REST API module using Axum
//!
//! Serving layer around the classifier: classification in two response
//! profiles, stats, health and single-item knowledge contributions.

pub mod envelope;
pub mod handlers;
mod routes;

pub use handlers::AppState;

use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Build a CORS layer that is restrictive by default (same-origin only).
///
/// Set `SMART_RECYCLE_CORS_ORIGINS` to a comma-separated list of allowed
/// origins for browser clients on other hosts.
fn build_cors_layer() -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);
    match std::env::var("SMART_RECYCLE_CORS_ORIGINS") {
        Ok(origins) => {
            let allowed: Vec<_> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            base.allow_origin(allowed)
        }
        Err(_) => base,
    }
}

/// Create the complete application router.
pub fn create_app(state: AppState) -> Router {
    routes::api_routes(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}
