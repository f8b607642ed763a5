//! Cursor pagination driven by source-issued tokens.

use super::PageInfo;

/// Opaque cursors handed out by a remote source.
///
/// The controller never slices rows itself. It remembers which cursor the
/// current page was fetched with and the `next`/`prev` tokens the source
/// returned, and turns navigation into the cursor for the next request.
/// Tokens are forwarded exactly as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorPagination {
    limit: usize,
    cursor: Option<String>,
    next: Option<String>,
    prev: Option<String>,
    page_index: usize,
}

impl CursorPagination {
    /// First page with `limit` rows per request (at least one).
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            cursor: None,
            next: None,
            prev: None,
            page_index: 0,
        }
    }

    /// Rows requested per page.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Cursor the current page is (to be) fetched with; `None` is the first
    /// page.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Whether the source reported a next page.
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    /// Whether the source reported a previous page.
    pub fn has_prev(&self) -> bool {
        self.prev.is_some()
    }

    /// Stores the tokens returned with a page.
    pub fn receive(&mut self, next: Option<String>, prev: Option<String>) {
        self.next = next;
        self.prev = prev;
    }

    /// Moves to the next page. Returns `false` when there is none.
    pub fn advance(&mut self) -> bool {
        match self.next.take() {
            Some(next) => {
                self.cursor = Some(next);
                self.prev = None;
                self.page_index += 1;
                true
            }
            None => false,
        }
    }

    /// Moves to the previous page. Returns `false` when there is none.
    pub fn retreat(&mut self) -> bool {
        match self.prev.take() {
            Some(prev) => {
                self.cursor = Some(prev);
                self.next = None;
                self.page_index = self.page_index.saturating_sub(1);
                true
            }
            None => false,
        }
    }

    /// Changes the limit. Held cursors are dropped and the first page
    /// becomes current.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.max(1);
        self.reset();
    }

    /// Drops held cursors and returns to the first page.
    pub fn reset(&mut self) {
        self.cursor = None;
        self.next = None;
        self.prev = None;
        self.page_index = 0;
    }

    /// Page summary; `total` is the source-reported total, if any.
    pub fn info(&self, total: Option<usize>) -> PageInfo {
        PageInfo {
            page_index: self.page_index,
            page_size: Some(self.limit),
            page_count: total.map(|t| t.div_ceil(self.limit)),
            total_rows: total,
            has_prev: self.has_prev(),
            has_next: self.has_next(),
        }
    }
}
