//! HTTP request handlers.

mod api_types;
mod extract;
mod health;

pub use api_types::{ApiError, ErrorBody, ErrorResponse, ExtractResponse};
pub use extract::{extract_hybrid, extract_tables, extract_text};
pub use health::health;
