//! Edit collaborators: validation and persistence.

use async_trait::async_trait;

use crate::error::CallbackResult;
use crate::model::Row;
use crate::model::RowId;
use crate::model::Value;

/// Validates a pending cell value.
///
/// Returns an error message to block the commit, `None` to allow it.
/// Closures implement this trait directly.
pub trait CellValidator: Send + Sync {
    /// Validates `value` for the cell at `row_id`/`column`.
    fn validate(&self, row_id: &RowId, column: &str, value: &Value) -> Option<String>;
}

impl<F> CellValidator for F
where
    F: Fn(&RowId, &str, &Value) -> Option<String> + Send + Sync,
{
    fn validate(&self, row_id: &RowId, column: &str, value: &Value) -> Option<String> {
        self(row_id, column, value)
    }
}

/// Persists a committed cell value.
///
/// `row` is the row as it was before the edit.
#[async_trait]
pub trait CellPersistence: Send + Sync {
    /// Stores `value` for the cell at `row_id`/`column`.
    async fn on_cell_change(
        &self,
        row_id: &RowId,
        column: &str,
        value: &Value,
        row: &Row,
    ) -> CallbackResult<()>;
}
