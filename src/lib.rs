//! docsift - PDF text and table extraction service.
//!
//! Uploaded PDFs are split into page-range chunks sized to backend limits,
//! dispatched to extraction backends with bounded concurrency and retries,
//! and merged back into one page-ordered result.

pub mod cli;
pub mod config;
pub mod extraction;
pub mod models;
pub mod server;

#[cfg(test)]
mod test_support;
