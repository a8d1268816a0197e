//! Chunk planning.
//!
//! Splits a document's page range into consecutive batches that respect a
//! backend's pages-per-request limit.

use super::error::PlanError;
use crate::models::Chunk;

/// Partition `[1, total_pages]` into chunks of at most `max_pages_per_chunk`.
///
/// Every chunk but the last is full; the last takes the remainder.
pub fn plan(total_pages: u32, max_pages_per_chunk: u32) -> Result<Vec<Chunk>, PlanError> {
    if total_pages < 1 || max_pages_per_chunk < 1 {
        return Err(PlanError::InvalidRange {
            total_pages,
            max_pages_per_chunk,
        });
    }

    let chunks = (1..=total_pages)
        .step_by(max_pages_per_chunk as usize)
        .enumerate()
        .map(|(index, start)| {
            let end = start
                .saturating_add(max_pages_per_chunk - 1)
                .min(total_pages);
            Chunk::new(index, start, end)
        })
        .collect();

    Ok(chunks)
}
