//! Stable machine-readable error codes.

/// Subsystem an [`ErrorCode`] belongs to.
///
/// The hundreds digit of the numeric code identifies the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Row data problems (1xx).
    Data,
    /// Column declaration problems (2xx).
    Column,
    /// Table configuration problems (3xx).
    Config,
    /// Missing host-supplied collaborators (4xx).
    Context,
    /// Failures while the table is running (5xx).
    Runtime,
}

impl ErrorCategory {
    /// Returns `true` if errors in this category abort setup instead of
    /// being recovered.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ErrorCategory::Runtime)
    }
}

/// Every error raised by the engine carries one of these codes.
///
/// The numeric value and the string id are both stable and safe to persist
/// or match on in host code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorCode {
    /// Two rows share an id.
    DuplicateRowId,
    /// A row has no usable id.
    MissingRowId,
    /// Row data could not be interpreted.
    InvalidDataFormat,
    /// The remote data source failed to deliver a page.
    DataFetchFailed,

    /// A column key is empty or otherwise unusable.
    InvalidColumnKey,
    /// Two columns share a key.
    DuplicateColumnKey,
    /// A column has neither an accessor nor a resolvable key.
    MissingColumnAccessor,

    /// A configuration value is out of range.
    InvalidConfig,
    /// A required configuration value is absent.
    MissingConfig,
    /// Two configuration options cannot be combined.
    IncompatibleConfig,

    /// A collaborator needed by an operation was never bound to the table.
    ContextMissing,

    /// A cell renderer failed.
    RenderFailed,
    /// Row measurement failed while computing the virtualization window.
    VirtualizationFailed,
    /// Persisting a cell edit failed.
    EditFailed,
    /// A selection operation failed.
    SelectionFailed,
    /// Producing the export stream failed.
    ExportFailed,
    /// A custom filter predicate failed.
    FilterFailed,
    /// A custom sort comparator failed.
    SortFailed,
    /// A custom aggregation failed.
    AggregationFailed,
    /// A cell value was rejected by the validator.
    CellValidationFailed,
}

impl ErrorCode {
    /// All codes, in numeric order.
    pub const ALL: [ErrorCode; 20] = [
        ErrorCode::DuplicateRowId,
        ErrorCode::MissingRowId,
        ErrorCode::InvalidDataFormat,
        ErrorCode::DataFetchFailed,
        ErrorCode::InvalidColumnKey,
        ErrorCode::DuplicateColumnKey,
        ErrorCode::MissingColumnAccessor,
        ErrorCode::InvalidConfig,
        ErrorCode::MissingConfig,
        ErrorCode::IncompatibleConfig,
        ErrorCode::ContextMissing,
        ErrorCode::RenderFailed,
        ErrorCode::VirtualizationFailed,
        ErrorCode::EditFailed,
        ErrorCode::SelectionFailed,
        ErrorCode::ExportFailed,
        ErrorCode::FilterFailed,
        ErrorCode::SortFailed,
        ErrorCode::AggregationFailed,
        ErrorCode::CellValidationFailed,
    ];

    /// Numeric code, grouped by subsystem.
    pub fn number(&self) -> u16 {
        match self {
            ErrorCode::DuplicateRowId => 101,
            ErrorCode::MissingRowId => 102,
            ErrorCode::InvalidDataFormat => 103,
            ErrorCode::DataFetchFailed => 104,
            ErrorCode::InvalidColumnKey => 201,
            ErrorCode::DuplicateColumnKey => 202,
            ErrorCode::MissingColumnAccessor => 203,
            ErrorCode::InvalidConfig => 301,
            ErrorCode::MissingConfig => 302,
            ErrorCode::IncompatibleConfig => 303,
            ErrorCode::ContextMissing => 401,
            ErrorCode::RenderFailed => 501,
            ErrorCode::VirtualizationFailed => 502,
            ErrorCode::EditFailed => 503,
            ErrorCode::SelectionFailed => 504,
            ErrorCode::ExportFailed => 505,
            ErrorCode::FilterFailed => 506,
            ErrorCode::SortFailed => 507,
            ErrorCode::AggregationFailed => 508,
            ErrorCode::CellValidationFailed => 509,
        }
    }

    /// Stable string id. Also used as the recovery strategy id.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DuplicateRowId => "DUPLICATE_ROW_ID",
            ErrorCode::MissingRowId => "MISSING_ROW_ID",
            ErrorCode::InvalidDataFormat => "INVALID_DATA_FORMAT",
            ErrorCode::DataFetchFailed => "DATA_FETCH_FAILED",
            ErrorCode::InvalidColumnKey => "INVALID_COLUMN_KEY",
            ErrorCode::DuplicateColumnKey => "DUPLICATE_COLUMN_KEY",
            ErrorCode::MissingColumnAccessor => "MISSING_COLUMN_ACCESSOR",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::MissingConfig => "MISSING_CONFIG",
            ErrorCode::IncompatibleConfig => "INCOMPATIBLE_CONFIG",
            ErrorCode::ContextMissing => "CONTEXT_MISSING",
            ErrorCode::RenderFailed => "RENDER_ERROR",
            ErrorCode::VirtualizationFailed => "VIRTUALIZATION_ERROR",
            ErrorCode::EditFailed => "EDIT_FAILED",
            ErrorCode::SelectionFailed => "SELECTION_ERROR",
            ErrorCode::ExportFailed => "EXPORT_ERROR",
            ErrorCode::FilterFailed => "FILTER_ERROR",
            ErrorCode::SortFailed => "SORT_ERROR",
            ErrorCode::AggregationFailed => "AGGREGATION_ERROR",
            ErrorCode::CellValidationFailed => "CELL_VALIDATION_FAILED",
        }
    }

    /// Looks a code up by its string id.
    pub fn from_str_id(id: &str) -> Option<ErrorCode> {
        Self::ALL.iter().copied().find(|code| code.as_str() == id)
    }

    /// Subsystem this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self.number() / 100 {
            1 => ErrorCategory::Data,
            2 => ErrorCategory::Column,
            3 => ErrorCategory::Config,
            4 => ErrorCategory::Context,
            _ => ErrorCategory::Runtime,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_follow_hundreds_digit() {
        assert_eq!(ErrorCode::DuplicateRowId.category(), ErrorCategory::Data);
        assert_eq!(ErrorCode::DuplicateColumnKey.category(), ErrorCategory::Column);
        assert_eq!(ErrorCode::IncompatibleConfig.category(), ErrorCategory::Config);
        assert_eq!(ErrorCode::ContextMissing.category(), ErrorCategory::Context);
        assert_eq!(ErrorCode::FilterFailed.category(), ErrorCategory::Runtime);
    }

    #[test]
    fn test_codes_are_unique() {
        let mut numbers: Vec<u16> = ErrorCode::ALL.iter().map(|c| c.number()).collect();
        numbers.sort_unstable();
        numbers.dedup();
        assert_eq!(numbers.len(), ErrorCode::ALL.len());
    }

    #[test]
    fn test_string_id_roundtrip() {
        for code in ErrorCode::ALL {
            assert_eq!(ErrorCode::from_str_id(code.as_str()), Some(code));
        }
        assert_eq!(ErrorCode::from_str_id("NOPE"), None);
    }

    #[test]
    fn test_only_runtime_is_recoverable() {
        assert!(ErrorCategory::Column.is_fatal());
        assert!(ErrorCategory::Context.is_fatal());
        assert!(!ErrorCategory::Runtime.is_fatal());
    }
}
