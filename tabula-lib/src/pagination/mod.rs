//! Pagination controller: offset slicing, cursor forwarding and the remote
//! fetch contract.

mod cursor;
mod offset;
mod remote;

pub use cursor::*;
pub use offset::*;
pub use remote::*;

use serde::Deserialize;
use serde::Serialize;

/// How rows are split into pages. Fixed per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationMode {
    /// Page index and size over locally held rows.
    #[default]
    Offset,
    /// Source-issued cursors over remote rows.
    Cursor,
    /// No pagination.
    None,
}

/// The pagination controller a table runs with, chosen by its mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Paginator {
    /// Offset pagination.
    Offset(OffsetPagination),
    /// Cursor pagination.
    Cursor(CursorPagination),
    /// Everything on one page.
    None,
}

impl Paginator {
    /// Creates the controller for `mode`.
    pub fn new(mode: PaginationMode, page_size: usize) -> Self {
        match mode {
            PaginationMode::Offset => Paginator::Offset(OffsetPagination::new(page_size)),
            PaginationMode::Cursor => Paginator::Cursor(CursorPagination::new(page_size)),
            PaginationMode::None => Paginator::None,
        }
    }

    /// Returns to the first page, dropping held cursors.
    pub fn reset(&mut self) {
        match self {
            Paginator::Offset(offset) => offset.reset(),
            Paginator::Cursor(cursor) => cursor.reset(),
            Paginator::None => {}
        }
    }

    /// Rows per page, if paginated.
    pub fn page_size(&self) -> Option<usize> {
        match self {
            Paginator::Offset(offset) => Some(offset.page_size()),
            Paginator::Cursor(cursor) => Some(cursor.limit()),
            Paginator::None => None,
        }
    }
}
