//! Router configuration for the web server.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Room for multipart framing around a maximum-size upload.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_file_size.saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/extract", post(handlers::extract_hybrid))
        .route("/extract-text", post(handlers::extract_text))
        .route("/extract-tables", post(handlers::extract_tables))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
