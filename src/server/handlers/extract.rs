//! Upload and extraction endpoints.

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{field, info, info_span, Instrument};
use uuid::Uuid;

use super::super::AppState;
use super::api_types::{ApiError, ExtractResponse};
use crate::models::{Document, ExtractionRequestMode};

/// Name of the multipart field carrying the PDF.
const FILE_FIELD: &str = "file";

/// `POST /extract`
pub async fn extract_hybrid(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    handle(state, multipart, ExtractionRequestMode::Hybrid).await
}

/// `POST /extract-text`
pub async fn extract_text(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    handle(state, multipart, ExtractionRequestMode::TextOnly).await
}

/// `POST /extract-tables`
pub async fn extract_tables(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    handle(state, multipart, ExtractionRequestMode::TablesOnly).await
}

async fn handle(
    state: AppState,
    multipart: Result<Multipart, MultipartRejection>,
    mode: ExtractionRequestMode,
) -> Response {
    let span = info_span!(
        "extract",
        request_id = %Uuid::new_v4(),
        mode = %mode,
        filename = field::Empty,
    );

    match run(state, multipart, mode).instrument(span).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn run(
    state: AppState,
    multipart: Result<Multipart, MultipartRejection>,
    mode: ExtractionRequestMode,
) -> Result<ExtractResponse, ApiError> {
    let mut multipart =
        multipart.map_err(|e| ApiError::invalid_request(format!("Expected multipart upload: {}", e)))?;
    let (filename, bytes) = read_upload(&mut multipart, state.config.max_file_size).await?;
    tracing::Span::current().record("filename", filename.as_str());
    info!("Received {} ({} bytes)", filename, bytes.len());

    let name = filename.clone();
    let document = tokio::task::spawn_blocking(move || Document::from_bytes(name, bytes))
        .await
        .map_err(|e| ApiError::internal(format!("PDF parser task failed: {}", e)))?
        .map_err(|e| ApiError::unsupported_format(e.to_string()))?;

    let outcome = state.orchestrator.run(Arc::new(document), mode).await?;
    info!(
        "{}: {} ({} pages)",
        filename, outcome.state, outcome.result.metadata.total_pages
    );

    Ok(ExtractResponse::new(outcome.result, filename))
}

/// Pull the single PDF upload out of the multipart body and validate it.
async fn read_upload(
    multipart: &mut Multipart,
    max_file_size: usize,
) -> Result<(String, Vec<u8>), ApiError> {
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(multipart_error)?
            .ok_or_else(|| ApiError::invalid_request("No file provided"))?;

        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            return Err(ApiError::invalid_request("No file selected"));
        }
        if !has_pdf_extension(&filename) {
            return Err(ApiError::invalid_request("Only PDF files are supported"));
        }

        let bytes = field.bytes().await.map_err(multipart_error)?;
        if bytes.is_empty() {
            return Err(ApiError::invalid_request("Uploaded file is empty"));
        }
        if bytes.len() > max_file_size {
            return Err(ApiError::payload_too_large(format!(
                "File is {} bytes, limit is {}",
                bytes.len(),
                max_file_size
            )));
        }
        if !is_pdf_content(&bytes) {
            return Err(ApiError::invalid_request("File content is not a PDF"));
        }

        return Ok((filename, bytes.to_vec()));
    }
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large(err.body_text())
    } else {
        ApiError::invalid_request(err.body_text())
    }
}

fn has_pdf_extension(filename: &str) -> bool {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

fn is_pdf_content(bytes: &[u8]) -> bool {
    infer::get(bytes).is_some_and(|kind| kind.mime_type() == "application/pdf")
}
