//! Liveness endpoint.

use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;

use super::super::AppState;
use crate::extraction::BackendStatus;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backends: Option<BackendStatus>,
}

/// Health check endpoint for container orchestration.
///
/// Always answers 200; backend problems show up in `backends.available`.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let router = state.orchestrator.router().clone();
    let backends = match tokio::task::spawn_blocking(move || router.status()).await {
        Ok(status) => Some(status),
        Err(e) => {
            tracing::warn!("Backend status check failed: {}", e);
            None
        }
    };

    Json(HealthResponse {
        status: "ok",
        service: "docsift",
        backends,
    })
}
