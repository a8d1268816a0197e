//! Response envelopes shared by the HTTP handlers and the CLI.
//!
//! Success:
//! ```json
//! { "success": true, "data": { ... }, "filename": "report.pdf" }
//! ```
//! Failure:
//! ```json
//! { "success": false, "error": { "kind": "AuthFailure", "message": "..." } }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::extraction::{BackendErrorKind, OrchestrationError};
use crate::models::ExtractionResult;

/// Successful extraction, complete or partial.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractResponse {
    pub success: bool,
    pub data: ExtractionResult,
    pub filename: String,
}

impl ExtractResponse {
    pub fn new(data: ExtractionResult, filename: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            filename: filename.into(),
        }
    }
}

/// Error payload inside the envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorBody,
}

/// A failed request: HTTP status plus a stable error kind.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "InvalidRequest", message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, "PayloadTooLarge", message)
    }

    pub fn unsupported_format(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            BackendErrorKind::UnsupportedFormat.as_str(),
            message,
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal", message)
    }

    pub fn body(&self) -> ErrorResponse {
        ErrorResponse {
            success: false,
            error: ErrorBody {
                kind: self.kind.to_string(),
                message: self.message.clone(),
            },
        }
    }
}

impl From<OrchestrationError> for ApiError {
    fn from(err: OrchestrationError) -> Self {
        let status = match &err {
            OrchestrationError::EmptyDocument => StatusCode::UNPROCESSABLE_ENTITY,
            OrchestrationError::DocumentTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            OrchestrationError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
            OrchestrationError::Backend(e) => backend_status(e.kind),
            OrchestrationError::AllChunksFailed { last, .. } => backend_status(last.kind),
            OrchestrationError::InvalidRange(_) | OrchestrationError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.kind(), err.to_string())
    }
}

fn backend_status(kind: BackendErrorKind) -> StatusCode {
    match kind {
        BackendErrorKind::QuotaExceeded => StatusCode::SERVICE_UNAVAILABLE,
        BackendErrorKind::UnsupportedFormat => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body())).into_response()
    }
}
