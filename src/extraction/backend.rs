//! Extraction backend abstraction.
//!
//! Supports multiple engines behind one interface:
//! - Document AI: Google's cloud document-understanding API (text + tables)
//! - Tesseract: local OCR via command-line (text)
//! - Command: external table-structure tool printing JSON (tables)

use std::path::Path;
use std::process::Command;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::warn;

use super::error::BackendError;
use crate::models::{Chunk, ExtractionRequestMode, PageResult};

/// Available backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendType {
    /// Google Document AI processor over REST.
    #[serde(alias = "documentai", alias = "document_ai")]
    DocumentAi,
    /// Tesseract OCR via command-line.
    Tesseract,
    /// Configured table-extraction command.
    Command,
}

impl BackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendType::DocumentAi => "document-ai",
            BackendType::Tesseract => "tesseract",
            BackendType::Command => "command",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "document-ai" | "documentai" | "document_ai" | "docai" => Some(BackendType::DocumentAi),
            "tesseract" => Some(BackendType::Tesseract),
            "command" | "camelot" => Some(BackendType::Command),
            _ => None,
        }
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a backend can extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub text: bool,
    pub tables: bool,
}

impl Capabilities {
    pub const TEXT: Self = Self {
        text: true,
        tables: false,
    };
    pub const TABLES: Self = Self {
        text: false,
        tables: true,
    };
    pub const ALL: Self = Self {
        text: true,
        tables: true,
    };

    /// Whether every capability `mode` needs is present.
    pub fn supports(&self, mode: ExtractionRequestMode) -> bool {
        (!mode.wants_text() || self.text) && (!mode.wants_tables() || self.tables)
    }
}

/// Trait for extraction backends.
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Get the backend type.
    fn backend_type(&self) -> BackendType;

    fn capabilities(&self) -> Capabilities;

    /// Check if this backend is available (binaries installed, credentials set).
    fn is_available(&self) -> bool;

    /// Get a description of what's needed to make this backend available.
    fn availability_hint(&self) -> String;

    /// Run the engine on a standalone PDF.
    ///
    /// Page numbers in the result are relative to `pdf` (first page = 1).
    /// Temporary artifacts must be released before this returns.
    async fn extract(
        &self,
        pdf: &[u8],
        mode: ExtractionRequestMode,
    ) -> Result<Vec<PageResult>, BackendError>;

    /// Extract one chunk, returning pages in the document's global numbering.
    async fn invoke(
        &self,
        chunk: &Chunk,
        pdf: &[u8],
        mode: ExtractionRequestMode,
    ) -> Result<Vec<PageResult>, BackendError> {
        let pages = self.extract(pdf, mode).await?;
        Ok(normalize_pages(chunk, pages, mode, self.backend_type()))
    }
}

/// Rebase chunk-local page numbers to global ones and drop anything `mode`
/// did not ask for.
///
/// Pages the engine reported outside the chunk are discarded.
pub fn normalize_pages(
    chunk: &Chunk,
    pages: Vec<PageResult>,
    mode: ExtractionRequestMode,
    backend: BackendType,
) -> Vec<PageResult> {
    pages
        .into_iter()
        .filter_map(|mut page| {
            let Some(global) = chunk.global_page(page.page_number) else {
                warn!(
                    "{} returned page {} outside {}",
                    backend, page.page_number, chunk
                );
                return None;
            };

            page.page_number = global;
            for table in &mut page.tables {
                table.page_number = global;
            }
            for entity in &mut page.entities {
                entity.page_number = global;
            }
            for field in &mut page.form_fields {
                field.page_number = global;
            }
            if !mode.wants_text() {
                page.clear_text();
            }
            if !mode.wants_tables() {
                page.tables.clear();
            }
            Some(page)
        })
        .collect()
}

/// Check if a binary is available in PATH.
pub fn check_binary(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Create a scratch directory for one chunk, removed when dropped.
pub fn scratch_dir(root: Option<&Path>) -> std::io::Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("docsift-");
    match root {
        Some(root) => builder.tempdir_in(root),
        None => builder.tempdir(),
    }
}
