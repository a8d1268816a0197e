//! HTTP surface for the extraction pipeline.
//!
//! Routes:
//! - `GET /health`: liveness plus backend availability
//! - `POST /extract`: hybrid text and table extraction
//! - `POST /extract-text`, `POST /extract-tables`: single-capability modes

mod handlers;
mod routes;

pub use handlers::{ApiError, ErrorBody, ErrorResponse, ExtractResponse};
pub use routes::create_router;

use std::sync::Arc;

use crate::config::{Config, ConfigError};
use crate::extraction::{BackendRouter, Orchestrator};

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Build backends and the orchestrator from configuration.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let router = Arc::new(BackendRouter::from_config(&config)?);
        let orchestrator = Orchestrator::new(config.orchestrator(), router);
        Ok(Self::with_orchestrator(config, orchestrator))
    }

    /// Use an already assembled orchestrator.
    pub fn with_orchestrator(config: Config, orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            config: Arc::new(config),
        }
    }
}

/// Start the web server.
pub async fn serve(config: Config, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(config)?;
    let app = create_router(state);

    let listener = bind_listener(host, port).await?;
    tracing::info!("Starting server at http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Bind `host:port`, resolving hostnames such as `localhost`.
async fn bind_listener(host: &str, port: u16) -> std::io::Result<tokio::net::TcpListener> {
    tokio::net::TcpListener::bind((host, port)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::BackendErrorKind;
    use crate::test_support::{orchestrator_with, pdf_with_pages, EchoBackend};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use std::sync::atomic::Ordering;
    use tower::ServiceExt;

    const BOUNDARY: &str = "docsift-test-boundary";

    fn test_config() -> Config {
        Config {
            max_pages_per_chunk: 2,
            document_page_cap: 10,
            ..Config::default()
        }
    }

    fn app_with(config: Config, backend: std::sync::Arc<EchoBackend>) -> axum::Router {
        let orchestrator = orchestrator_with(backend, config.orchestrator());
        create_router(AppState::with_orchestrator(config, orchestrator))
    }

    fn multipart_body(field: &str, filename: &str, bytes: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload(uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_bind_accepts_hostnames() {
        let listener = bind_listener("localhost", 0).await.unwrap();
        assert!(listener.local_addr().unwrap().ip().is_loopback());

        let listener = bind_listener("127.0.0.1", 0).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = app_with(test_config(), EchoBackend::new());
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "docsift");
        assert_eq!(body["backends"]["available"], true);
        assert_eq!(body["backends"]["text"], "document-ai");
    }

    #[tokio::test]
    async fn test_extract_hybrid_success() {
        let backend = EchoBackend::new();
        let app = app_with(test_config(), backend.clone());
        let body = multipart_body("file", "report.pdf", &pdf_with_pages(3));

        let (status, body) = send(app, upload("/extract", body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["filename"], "report.pdf");

        let data = &body["data"];
        assert_eq!(data["pages"].as_array().unwrap().len(), 3);
        assert_eq!(data["pages"][2]["page_number"], 3);
        assert_eq!(data["pages"][2]["text"], "text for page 1");
        assert_eq!(data["metadata"]["extraction_method"], "hybrid");
        assert_eq!(data["metadata"]["total_tables"], 3);
        assert_eq!(data["metadata"]["chunks_processed"], 2);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_extract_text_drops_tables() {
        let app = app_with(test_config(), EchoBackend::new());
        let body = multipart_body("file", "report.PDF", &pdf_with_pages(1));

        let (status, body) = send(app, upload("/extract-text", body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["metadata"]["extraction_method"], "text_only");
        assert_eq!(body["data"]["metadata"]["has_tables"], false);
        assert_eq!(body["data"]["full_text"], "text for page 1");
    }

    #[tokio::test]
    async fn test_extract_tables_only() {
        let app = app_with(test_config(), EchoBackend::new());
        let body = multipart_body("file", "report.pdf", &pdf_with_pages(2));

        let (status, body) = send(app, upload("/extract-tables", body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["metadata"]["extraction_method"], "tables_only");
        assert!(body["data"]["pages"][0]["text"].is_null());
        assert_eq!(body["data"]["pages"][1]["tables"][0]["table_id"], 1);
    }

    #[tokio::test]
    async fn test_missing_file_field() {
        let app = app_with(test_config(), EchoBackend::new());
        let body = multipart_body("document", "report.pdf", &pdf_with_pages(1));

        let (status, body) = send(app, upload("/extract", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["kind"], "InvalidRequest");
    }

    #[tokio::test]
    async fn test_rejects_wrong_extension() {
        let app = app_with(test_config(), EchoBackend::new());
        let body = multipart_body("file", "report.docx", &pdf_with_pages(1));

        let (status, body) = send(app, upload("/extract", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "InvalidRequest");
    }

    #[tokio::test]
    async fn test_rejects_non_pdf_content() {
        let app = app_with(test_config(), EchoBackend::new());
        let body = multipart_body("file", "report.pdf", b"just some text, not a pdf");

        let (status, body) = send(app, upload("/extract", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "InvalidRequest");
    }

    #[tokio::test]
    async fn test_rejects_empty_file() {
        let app = app_with(test_config(), EchoBackend::new());
        let body = multipart_body("file", "report.pdf", b"");

        let (status, body) = send(app, upload("/extract", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "InvalidRequest");
    }

    #[tokio::test]
    async fn test_rejects_oversized_upload() {
        let config = Config {
            max_file_size: 64,
            ..test_config()
        };
        let app = app_with(config, EchoBackend::new());
        let body = multipart_body("file", "report.pdf", &pdf_with_pages(2));

        let (status, body) = send(app, upload("/extract", body)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["error"]["kind"], "PayloadTooLarge");
    }

    #[tokio::test]
    async fn test_unreadable_pdf() {
        let backend = EchoBackend::new();
        let app = app_with(test_config(), backend.clone());
        let body = multipart_body("file", "report.pdf", b"%PDF-1.5\nthis is not really a pdf");

        let (status, body) = send(app, upload("/extract", body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["kind"], "UnsupportedFormat");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_page_pdf_is_empty_document() {
        let backend = EchoBackend::new();
        let app = app_with(test_config(), backend.clone());
        let body = multipart_body("file", "blank.pdf", &pdf_with_pages(0));

        let (status, body) = send(app, upload("/extract", body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["kind"], "EmptyDocument");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_page_cap_rejected() {
        let config = Config {
            document_page_cap: 2,
            ..test_config()
        };
        let backend = EchoBackend::new();
        let app = app_with(config, backend.clone());
        let body = multipart_body("file", "report.pdf", &pdf_with_pages(3));

        let (status, body) = send(app, upload("/extract", body)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["error"]["kind"], "DocumentTooLarge");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_auth_failure_is_bad_gateway() {
        let backend = EchoBackend::failing(Some(BackendErrorKind::AuthFailure));
        let app = app_with(test_config(), backend);
        let body = multipart_body("file", "report.pdf", &pdf_with_pages(1));

        let (status, body) = send(app, upload("/extract", body)).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["kind"], "AuthFailure");
    }

    #[tokio::test]
    async fn test_quota_failure_is_unavailable() {
        let backend = EchoBackend::failing(Some(BackendErrorKind::QuotaExceeded));
        let app = app_with(test_config(), backend);
        let body = multipart_body("file", "report.pdf", &pdf_with_pages(1));

        let (status, body) = send(app, upload("/extract-text", body)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["kind"], "QuotaExceeded");
    }
}
