//! Result merging.
//!
//! Turns per-chunk outcomes into one [`ExtractionResult`] with exactly one
//! page entry per document page. Chunks are consumed in page order, never in
//! completion order.

use std::collections::BTreeMap;

use super::error::BackendError;
use crate::models::{
    Chunk, ExtractionMetadata, ExtractionMethod, ExtractionRequestMode, ExtractionResult,
    FailedRange, PageResult, StructuredData,
};

/// What happened to one chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    Succeeded(Vec<PageResult>),
    Failed(BackendError),
}

impl ChunkOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ChunkOutcome::Succeeded(_))
    }
}

/// Merge per-chunk outcomes for a `total_pages` document.
///
/// Pages owned by a failed chunk, or by no chunk at all, become empty
/// placeholders and downgrade the method to `partial`.
pub fn merge(
    total_pages: u32,
    mode: ExtractionRequestMode,
    outcomes: &[(Chunk, ChunkOutcome)],
) -> ExtractionResult {
    let mut ordered: Vec<&(Chunk, ChunkOutcome)> = outcomes.iter().collect();
    ordered.sort_by_key(|(chunk, _)| chunk.start);

    let mut slots: Vec<Option<PageResult>> = vec![None; total_pages as usize];
    let mut failed_ranges = Vec::new();

    for (chunk, outcome) in ordered {
        match outcome {
            ChunkOutcome::Succeeded(pages) => {
                let mut owned = combine_page_sets(Vec::new(), pages.clone())
                    .into_iter()
                    .filter(|p| chunk.contains(p.page_number))
                    .map(|p| (p.page_number, p))
                    .collect::<BTreeMap<_, _>>();
                for page in chunk.pages() {
                    if let Some(slot) = slots.get_mut(page as usize - 1) {
                        *slot = Some(
                            owned
                                .remove(&page)
                                .unwrap_or_else(|| PageResult::empty(page)),
                        );
                    }
                }
            }
            ChunkOutcome::Failed(err) => failed_ranges.push(FailedRange {
                start: chunk.start,
                end: chunk.end,
                kind: err.kind,
            }),
        }
    }

    let mut partial = !failed_ranges.is_empty();
    let mut structured_data = StructuredData::default();
    let pages: Vec<PageResult> = slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            let mut page = slot.unwrap_or_else(|| {
                partial = true;
                PageResult::empty(i as u32 + 1)
            });
            for (n, table) in page.tables.iter_mut().enumerate() {
                table.table_id = n as u32 + 1;
            }
            structured_data.entities.append(&mut page.entities);
            structured_data.form_fields.append(&mut page.form_fields);
            page
        })
        .collect();

    let full_text = pages
        .iter()
        .filter_map(|p| p.text.as_deref())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    let total_tables: usize = pages.iter().map(|p| p.tables.len()).sum();

    let metadata = ExtractionMetadata {
        total_pages,
        extraction_method: if partial {
            ExtractionMethod::Partial
        } else {
            mode.into()
        },
        has_tables: total_tables > 0,
        total_tables,
        chunks_processed: outcomes.len(),
        chunks_failed: failed_ranges.len(),
        failed_ranges,
    };

    ExtractionResult {
        pages,
        full_text,
        structured_data,
        metadata,
    }
}

/// Combine text-side and table-side results for the same pages.
///
/// Output is ordered by page number with one entry per page.
pub fn combine_page_sets(text: Vec<PageResult>, tables: Vec<PageResult>) -> Vec<PageResult> {
    let mut by_page: BTreeMap<u32, PageResult> = BTreeMap::new();
    for page in text.into_iter().chain(tables) {
        match by_page.get_mut(&page.page_number) {
            Some(existing) => existing.absorb(page),
            None => {
                by_page.insert(page.page_number, page);
            }
        }
    }
    by_page.into_values().collect()
}
