//! Offset pagination over a locally held sequence.

use std::ops::Range;

use serde::Serialize;

/// Page index and size for offset pagination.
///
/// The index is clamped against the row count on every refresh, so asking
/// for a page past the end lands on the last page instead of failing.
///
/// # Example
///
/// ```
/// use tabula_lib::pagination::OffsetPagination;
///
/// let mut pages = OffsetPagination::new(10);
/// pages.set_page(7);
/// assert_eq!(pages.range(25), 20..25);
/// assert_eq!(pages.page_index(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetPagination {
    page_index: usize,
    page_size: usize,
}

impl OffsetPagination {
    /// First page of `page_size` rows (at least one).
    pub fn new(page_size: usize) -> Self {
        Self {
            page_index: 0,
            page_size: page_size.max(1),
        }
    }

    /// Current zero-based page index.
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    /// Rows per page.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Requests a page; clamped on the next [`range`](Self::range).
    pub fn set_page(&mut self, page_index: usize) {
        self.page_index = page_index;
    }

    /// Moves to the next page if there is one.
    pub fn next(&mut self, total: usize) -> bool {
        if self.page_index + 1 < self.page_count(total) {
            self.page_index += 1;
            true
        } else {
            false
        }
    }

    /// Moves to the previous page if there is one.
    pub fn prev(&mut self) -> bool {
        if self.page_index > 0 {
            self.page_index -= 1;
            true
        } else {
            false
        }
    }

    /// Changes the page size and returns to the first page.
    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
        self.page_index = 0;
    }

    /// Returns to the first page.
    pub fn reset(&mut self) {
        self.page_index = 0;
    }

    /// Number of pages for `total` rows. Zero rows means zero pages.
    pub fn page_count(&self, total: usize) -> usize {
        total.div_ceil(self.page_size)
    }

    /// Clamps the index to the last valid page and returns the slice range
    /// `[index * size, index * size + size)` cut to `total`.
    pub fn range(&mut self, total: usize) -> Range<usize> {
        let last = self.page_count(total).saturating_sub(1);
        self.page_index = self.page_index.min(last);
        let start = (self.page_index * self.page_size).min(total);
        let end = (start + self.page_size).min(total);
        start..end
    }

    /// Page summary for `total` rows, without clamping.
    pub fn info(&self, total: usize) -> PageInfo {
        let page_count = self.page_count(total);
        PageInfo {
            page_index: self.page_index,
            page_size: Some(self.page_size),
            page_count: Some(page_count),
            total_rows: Some(total),
            has_prev: self.page_index > 0,
            has_next: self.page_index + 1 < page_count,
        }
    }
}

/// What the host needs to draw pagination controls.
///
/// Fields that a mode cannot know are `None`: cursor pagination has no page
/// count unless the source reports a total.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PageInfo {
    /// Zero-based page index (offset mode), or 0.
    pub page_index: usize,
    /// Rows per page, if paginated.
    pub page_size: Option<usize>,
    /// Number of pages, if known.
    pub page_count: Option<usize>,
    /// Total matching rows, if known.
    pub total_rows: Option<usize>,
    /// Whether a previous page exists.
    pub has_prev: bool,
    /// Whether a next page exists.
    pub has_next: bool,
}
