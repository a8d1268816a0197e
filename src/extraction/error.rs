//! Error types for the extraction pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::DocumentError;

/// Classification of a backend failure.
///
/// Drives the orchestrator's retry and abort decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendErrorKind {
    AuthFailure,
    QuotaExceeded,
    UnsupportedFormat,
    Timeout,
    Transient,
    Unknown,
}

impl BackendErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthFailure => "AuthFailure",
            Self::QuotaExceeded => "QuotaExceeded",
            Self::UnsupportedFormat => "UnsupportedFormat",
            Self::Timeout => "Timeout",
            Self::Transient => "Transient",
            Self::Unknown => "Unknown",
        }
    }

    /// Worth another attempt on the same chunk.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient | Self::Timeout)
    }

    /// No later chunk can succeed either; abort the whole document.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AuthFailure | Self::QuotaExceeded)
    }

    /// Ordering used when two backends fail on the same chunk.
    pub fn severity(&self) -> u8 {
        if self.is_fatal() {
            2
        } else if self.is_retryable() {
            0
        } else {
            1
        }
    }
}

impl std::fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A failed backend invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::AuthFailure, message)
    }

    pub fn quota(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::QuotaExceeded, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::UnsupportedFormat, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Timeout, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Transient, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Unknown, message)
    }

    /// Pick whichever of two errors should decide a chunk's outcome.
    pub fn more_severe(self, other: BackendError) -> BackendError {
        if other.kind.severity() > self.kind.severity() {
            other
        } else {
            self
        }
    }
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        BackendError::unknown(format!("IO error: {}", e))
    }
}

/// Bad chunk-planning input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("Invalid range: total_pages={total_pages}, max_pages_per_chunk={max_pages_per_chunk}")]
    InvalidRange {
        total_pages: u32,
        max_pages_per_chunk: u32,
    },
}

/// Terminal failure of one document's extraction.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error(transparent)]
    InvalidRange(#[from] PlanError),

    #[error("Document has no pages")]
    EmptyDocument,

    #[error("Document has {pages} pages, limit is {cap}")]
    DocumentTooLarge { pages: u32, cap: u32 },

    #[error("Request deadline of {0:?} exceeded")]
    DeadlineExceeded(std::time::Duration),

    #[error("Extraction aborted: {0}")]
    Backend(BackendError),

    #[error("All {chunks} chunks failed, last error: {last}")]
    AllChunksFailed { chunks: usize, last: BackendError },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OrchestrationError {
    /// Stable error kind reported to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRange(_) => "InvalidRange",
            Self::EmptyDocument => "EmptyDocument",
            Self::DocumentTooLarge { .. } => "DocumentTooLarge",
            Self::DeadlineExceeded(_) => "DeadlineExceeded",
            Self::Backend(e) => e.kind.as_str(),
            Self::AllChunksFailed { last, .. } => last.kind.as_str(),
            Self::Internal(_) => "Internal",
        }
    }
}

impl From<DocumentError> for OrchestrationError {
    fn from(e: DocumentError) -> Self {
        OrchestrationError::Internal(e.to_string())
    }
}
