//! Table configuration.

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::error::DataTableError;
use crate::error::ErrorCode;
use crate::error::Result;
use crate::filter::SearchMode;
use crate::pagination::PaginationMode;
use crate::selection::SelectionMode;
use crate::virtualization::VirtualizeMode;

/// Where rows come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataMode {
    /// All rows are held by the table and processed locally.
    #[default]
    Local,
    /// The table holds one page at a time, fetched from a remote source.
    Remote,
}

/// Configuration for a table.
///
/// Every field has a default, so hosts only set what they need. The same
/// shape loads from JSON with missing fields defaulted.
///
/// # Example
///
/// ```
/// use tabula_lib::config::{DataMode, TableConfig};
/// use tabula_lib::pagination::PaginationMode;
///
/// let config = TableConfig::default()
///     .page_size(25)
///     .max_sort_columns(2);
/// assert!(config.validate().is_ok());
///
/// let remote = TableConfig::from_json(r#"{"mode": "remote", "pagination": "cursor"}"#).unwrap();
/// assert_eq!(remote.mode, DataMode::Remote);
/// assert_eq!(remote.pagination, PaginationMode::Cursor);
/// assert_eq!(remote.page_size, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Local or remote rows.
    pub mode: DataMode,
    /// Pagination mode.
    pub pagination: PaginationMode,
    /// Rows per page (offset) or page limit (cursor).
    pub page_size: usize,
    /// Whether sorting on one column keeps the others.
    pub multi_sort: bool,
    /// Maximum number of sort keys.
    pub max_sort_columns: usize,
    /// When rows are virtualized.
    pub virtualize: VirtualizeMode,
    /// Row count above which `auto` virtualization kicks in.
    pub virtualize_threshold: usize,
    /// Height assumed for rows that have not been measured.
    pub estimate_row_height: f64,
    /// Extra rows rendered on each side of the viewport.
    pub overscan: usize,
    /// Quiet period before search input is applied, in milliseconds.
    pub search_debounce_ms: u64,
    /// Columns searched by the search box; `None` means every filterable
    /// column.
    pub search_columns: Option<Vec<String>>,
    /// How search text is matched.
    pub search_mode: SearchMode,
    /// Selection mode.
    pub selection_mode: SelectionMode,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            mode: DataMode::Local,
            pagination: PaginationMode::Offset,
            page_size: 10,
            multi_sort: true,
            max_sort_columns: 3,
            virtualize: VirtualizeMode::Auto,
            virtualize_threshold: 50,
            estimate_row_height: 40.0,
            overscan: 3,
            search_debounce_ms: 300,
            search_columns: None,
            search_mode: SearchMode::Substring,
            selection_mode: SelectionMode::Multi,
        }
    }
}

impl TableConfig {
    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when the text is not valid JSON or a field has the
    /// wrong shape.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| {
            DataTableError::invalid_config(format!("invalid table config: {e}"))
                .with_context("line", e.line())
                .with_context("column", e.column())
        })
    }

    /// Sets where rows come from.
    pub fn mode(mut self, mode: DataMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the pagination mode.
    pub fn pagination(mut self, pagination: PaginationMode) -> Self {
        self.pagination = pagination;
        self
    }

    /// Sets the page size.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Enables or disables multi-column sorting.
    pub fn multi_sort(mut self, enabled: bool) -> Self {
        self.multi_sort = enabled;
        self
    }

    /// Sets the maximum number of sort keys.
    pub fn max_sort_columns(mut self, n: usize) -> Self {
        self.max_sort_columns = n;
        self
    }

    /// Sets when rows are virtualized.
    pub fn virtualize(mut self, mode: VirtualizeMode) -> Self {
        self.virtualize = mode;
        self
    }

    /// Sets the `auto` virtualization threshold.
    pub fn virtualize_threshold(mut self, rows: usize) -> Self {
        self.virtualize_threshold = rows;
        self
    }

    /// Sets the estimated row height.
    pub fn estimate_row_height(mut self, height: f64) -> Self {
        self.estimate_row_height = height;
        self
    }

    /// Sets the overscan.
    pub fn overscan(mut self, rows: usize) -> Self {
        self.overscan = rows;
        self
    }

    /// Sets the search quiet period.
    pub fn search_debounce(mut self, delay: Duration) -> Self {
        self.search_debounce_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Restricts search to the given columns.
    pub fn search_columns(mut self, columns: Vec<String>) -> Self {
        self.search_columns = Some(columns);
        self
    }

    /// Sets how search text is matched.
    pub fn search_mode(mut self, mode: SearchMode) -> Self {
        self.search_mode = mode;
        self
    }

    /// Sets the selection mode.
    pub fn selection_mode(mut self, mode: SelectionMode) -> Self {
        self.selection_mode = mode;
        self
    }

    /// The search quiet period.
    pub fn search_delay(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    /// Checks the configuration for invalid or contradictory settings.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` for a zero page size or sort limit, or a row height
    ///   that is not a positive finite number.
    /// - `IncompatibleConfig` for cursor pagination over local rows or offset
    ///   pagination over remote rows.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(DataTableError::invalid_config("page_size must be at least 1")
                .with_context("field", "page_size"));
        }
        if self.max_sort_columns == 0 {
            return Err(DataTableError::invalid_config("max_sort_columns must be at least 1")
                .with_context("field", "max_sort_columns"));
        }
        if !self.estimate_row_height.is_finite() || self.estimate_row_height <= 0.0 {
            return Err(DataTableError::invalid_config(format!(
                "estimate_row_height must be positive, got {}",
                self.estimate_row_height
            ))
            .with_context("field", "estimate_row_height"));
        }
        if let Some(columns) = &self.search_columns
            && columns.iter().any(|c| c.is_empty())
        {
            return Err(DataTableError::invalid_config("search_columns contains an empty key")
                .with_context("field", "search_columns"));
        }
        match (self.mode, self.pagination) {
            (DataMode::Local, PaginationMode::Cursor) => Err(incompatible(
                "cursor pagination needs a remote data source",
            )),
            (DataMode::Remote, PaginationMode::Offset) => Err(incompatible(
                "remote data sources page by cursor; offset pagination is local only",
            )),
            _ => Ok(()),
        }
    }
}

fn incompatible(message: &str) -> DataTableError {
    DataTableError::new(ErrorCode::IncompatibleConfig, message)
        .with_context("fields", serde_json::json!(["mode", "pagination"]))
}
