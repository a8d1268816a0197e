//! Uploaded PDF documents.
//!
//! A `Document` is built once per request from the uploaded bytes and is
//! never mutated afterwards. Chunk sub-PDFs are produced from a clone of the
//! parsed object graph, so concurrent chunk tasks can share one `Document`
//! behind an `Arc`.

use std::sync::Arc;

use thiserror::Error;

use super::Chunk;

/// Errors from loading or splitting a PDF.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Unreadable PDF: {0}")]
    Unreadable(String),

    #[error("Pages {start}-{end} are outside the document ({total} pages)")]
    RangeOutOfBounds { start: u32, end: u32, total: u32 },

    #[error("Failed to write chunk PDF: {0}")]
    Split(String),
}

/// A parsed, immutable PDF.
pub struct Document {
    filename: String,
    bytes: Arc<[u8]>,
    pdf: lopdf::Document,
    page_count: u32,
}

impl Document {
    /// Parse an uploaded PDF.
    pub fn from_bytes(
        filename: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Result<Self, DocumentError> {
        let bytes: Arc<[u8]> = bytes.into();
        let pdf = lopdf::Document::load_mem(&bytes)
            .map_err(|e| DocumentError::Unreadable(e.to_string()))?;
        let page_count = pdf.get_pages().len() as u32;

        Ok(Self {
            filename: filename.into(),
            bytes,
            pdf,
            page_count,
        })
    }

    /// Source filename, for reporting only.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn byte_size(&self) -> usize {
        self.bytes.len()
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Build a standalone PDF holding exactly the chunk's pages.
    ///
    /// A chunk spanning the whole document reuses the uploaded bytes.
    pub fn chunk_bytes(&self, chunk: &Chunk) -> Result<Vec<u8>, DocumentError> {
        if chunk.start == 0 || chunk.end > self.page_count || chunk.start > chunk.end {
            return Err(DocumentError::RangeOutOfBounds {
                start: chunk.start,
                end: chunk.end,
                total: self.page_count,
            });
        }

        if chunk.start == 1 && chunk.end == self.page_count {
            return Ok(self.bytes.to_vec());
        }

        let mut pdf = self.pdf.clone();
        let outside: Vec<u32> = (1..=self.page_count)
            .filter(|page| !chunk.contains(*page))
            .collect();
        pdf.delete_pages(&outside);
        pdf.prune_objects();

        let mut out = Vec::new();
        pdf.save_to(&mut out)
            .map_err(|e| DocumentError::Split(e.to_string()))?;
        Ok(out)
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("filename", &self.filename)
            .field("byte_size", &self.bytes.len())
            .field("page_count", &self.page_count)
            .finish()
    }
}
