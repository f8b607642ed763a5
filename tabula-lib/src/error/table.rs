//! The engine's single error type.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::ErrorCode;
use super::ErrorCategory;

/// Boxed error returned by host-supplied callbacks.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for host-supplied callbacks.
pub type CallbackResult<T> = std::result::Result<T, CallbackError>;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, DataTableError>;

/// An error raised anywhere in the table pipeline.
///
/// Errors are a tagged struct rather than a family of types: match on
/// [`code`](DataTableError::code) to tell them apart. The `context` map carries
/// whatever identifies the failing item (row id, column key, page, ...).
///
/// # Example
///
/// ```
/// use tabula_lib::error::{DataTableError, ErrorCode};
///
/// let err = DataTableError::new(ErrorCode::DuplicateColumnKey, "column 'amt' declared twice")
///     .with_context("column", "amt");
///
/// assert_eq!(err.code, ErrorCode::DuplicateColumnKey);
/// assert_eq!(err.to_string(), "[202 DUPLICATE_COLUMN_KEY] column 'amt' declared twice");
/// ```
#[derive(Debug, Clone, thiserror::Error)]
#[error("[{} {}] {message}", .code.number(), .code.as_str())]
pub struct DataTableError {
    /// Machine-readable code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Structured details about the failing item.
    pub context: BTreeMap<String, serde_json::Value>,
    /// Underlying error, if any.
    #[source]
    pub cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl DataTableError {
    /// Creates a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: BTreeMap::new(),
            cause: None,
        }
    }

    /// Adds a context entry.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Attaches the underlying cause.
    pub fn with_cause(mut self, cause: CallbackError) -> Self {
        self.cause = Some(Arc::from(cause));
        self
    }

    /// Returns the subsystem of this error.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Returns `true` if this error aborts setup rather than being recovered.
    pub fn is_fatal(&self) -> bool {
        self.category().is_fatal()
    }

    /// Returns a context entry, if present.
    pub fn context_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.context.get(key)
    }

    // =========================================================================
    // Constructors for the common cases
    // =========================================================================

    pub(crate) fn duplicate_row_id(id: &str) -> Self {
        Self::new(ErrorCode::DuplicateRowId, format!("row id '{id}' appears more than once"))
            .with_context("row_id", id)
    }

    pub(crate) fn missing_row_id(index: usize) -> Self {
        Self::new(ErrorCode::MissingRowId, format!("row at index {index} has no usable 'id' field"))
            .with_context("index", index)
    }

    pub(crate) fn invalid_column_key(key: &str, reason: &str) -> Self {
        Self::new(ErrorCode::InvalidColumnKey, format!("column '{key}': {reason}"))
            .with_context("column", key)
    }

    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfig, message)
    }

    pub(crate) fn context_missing(collaborator: &str) -> Self {
        Self::new(
            ErrorCode::ContextMissing,
            format!("no {collaborator} is bound to this table"),
        )
        .with_context("collaborator", collaborator)
    }
}
