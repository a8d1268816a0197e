//! Page-range slices of a document.

use std::ops::RangeInclusive;

use serde::Serialize;

/// A contiguous, 1-indexed, inclusive page range `[start, end]` of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Chunk {
    /// Position of this chunk in the plan (0-based).
    pub index: usize,
    /// First global page number in the chunk.
    pub start: u32,
    /// Last global page number in the chunk (inclusive).
    pub end: u32,
}

impl Chunk {
    pub fn new(index: usize, start: u32, end: u32) -> Self {
        debug_assert!(start >= 1 && start <= end);
        Self { index, start, end }
    }

    /// Number of pages in the chunk.
    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// `(start, end)` pair.
    pub fn range(&self) -> (u32, u32) {
        (self.start, self.end)
    }

    pub fn pages(&self) -> RangeInclusive<u32> {
        self.start..=self.end
    }

    pub fn contains(&self, page: u32) -> bool {
        self.pages().contains(&page)
    }

    /// Map a chunk-local page number (1 = first page of the chunk) to the
    /// document's global numbering. Returns `None` for pages outside the chunk.
    pub fn global_page(&self, local_page: u32) -> Option<u32> {
        if local_page == 0 || local_page > self.len() {
            return None;
        }
        Some(self.start + local_page - 1)
    }
}

impl std::fmt::Display for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "chunk {} (pages {}-{})", self.index, self.start, self.end)
    }
}
