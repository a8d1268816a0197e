//! Data models for docsift.

mod chunk;
mod document;
mod extraction;

pub use chunk::Chunk;
pub use document::{Document, DocumentError};
pub use extraction::{
    BoundingBox, Entity, ExtractionMetadata, ExtractionMethod, ExtractionRequestMode,
    ExtractionResult, FailedRange, FormField, PageResult, StructuredData, TableResult,
    TextElement,
};
