//! Remote data source contract.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::CallbackResult;
use crate::filter::ColumnFilter;
use crate::model::Row;
use crate::sort::SortKey;

/// Everything a remote source needs to produce one page.
///
/// `sequence` identifies the request; responses are applied only while it is
/// the latest issued sequence.
#[derive(Debug, Clone)]
pub struct PageRequest {
    /// Request sequence number.
    pub sequence: u64,
    /// Active column filters.
    pub filters: BTreeMap<String, ColumnFilter>,
    /// Committed search value (blank for none).
    pub search: String,
    /// Sort keys in precedence order.
    pub sort: Vec<SortKey>,
    /// Cursor to fetch from; `None` for the first page.
    pub cursor: Option<String>,
    /// Page size; `None` when the table is not paginated.
    pub limit: Option<usize>,
}

/// A page of rows returned by a remote source.
///
/// # Example
///
/// ```
/// use tabula_lib::model::Row;
/// use tabula_lib::pagination::RemotePage;
///
/// let page = RemotePage::new(vec![Row::new("a"), Row::new("b")])
///     .with_next_cursor("c2")
///     .with_total_count(40);
/// assert!(page.has_more());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RemotePage {
    items: Vec<Row>,
    next_cursor: Option<String>,
    prev_cursor: Option<String>,
    total_count: Option<usize>,
}

impl RemotePage {
    /// Creates a page holding `items`.
    pub fn new(items: Vec<Row>) -> Self {
        Self {
            items,
            ..Default::default()
        }
    }

    /// Sets the cursor for the following page.
    pub fn with_next_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.next_cursor = Some(cursor.into());
        self
    }

    /// Sets the cursor for the preceding page.
    pub fn with_prev_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.prev_cursor = Some(cursor.into());
        self
    }

    /// Sets the total number of matching rows.
    pub fn with_total_count(mut self, count: usize) -> Self {
        self.total_count = Some(count);
        self
    }

    /// Rows on this page.
    pub fn items(&self) -> &[Row] {
        &self.items
    }

    /// Cursor for the following page.
    pub fn next_cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref()
    }

    /// Cursor for the preceding page.
    pub fn prev_cursor(&self) -> Option<&str> {
        self.prev_cursor.as_deref()
    }

    /// Total matching rows, if the source reports it.
    pub fn total_count(&self) -> Option<usize> {
        self.total_count
    }

    /// Returns `true` if a next page is available.
    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }

    pub(crate) fn into_parts(self) -> (Vec<Row>, Option<String>, Option<String>, Option<usize>) {
        (self.items, self.next_cursor, self.prev_cursor, self.total_count)
    }
}

/// Host-supplied page fetcher for remote mode.
///
/// Transport, authentication and timeouts are the implementation's
/// business; the table only cancels the future on teardown.
#[async_trait]
pub trait RemoteDataSource: Send + Sync {
    /// Fetches the page described by `request`.
    async fn fetch_page(&self, request: PageRequest) -> CallbackResult<RemotePage>;
}

/// Issues monotonically increasing request sequence numbers.
///
/// A response is current only if its sequence is the latest issued. Any
/// input change that makes in-flight responses obsolete calls
/// [`invalidate`](Self::invalidate), so a reply for a search that has since
/// been retyped, even to the same text, is never applied.
#[derive(Debug, Clone, Default)]
pub struct RequestSequencer {
    latest: u64,
}

impl RequestSequencer {
    /// Issues the next sequence number.
    pub fn issue(&mut self) -> u64 {
        self.latest += 1;
        self.latest
    }

    /// Makes every issued sequence stale.
    pub fn invalidate(&mut self) {
        self.latest += 1;
    }

    /// Returns `true` if `sequence` is the latest issued.
    pub fn is_current(&self, sequence: u64) -> bool {
        sequence == self.latest
    }

    /// The latest issued or invalidated sequence.
    pub fn latest(&self) -> u64 {
        self.latest
    }
}
