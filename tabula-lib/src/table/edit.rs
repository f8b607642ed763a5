//! Inline editing on the table.

use super::DataTable;
use crate::edit::CommitTicket;
use crate::edit::EditOutcome;
use crate::edit::EditSession;
use crate::error::CallbackError;
use crate::error::DataTableError;
use crate::error::ErrorCode;
use crate::error::Result;
use crate::error::guard_async;
use crate::model::RowId;
use crate::model::Value;

impl DataTable {
    /// Opens an edit session on a cell, snapshotting its current value.
    ///
    /// An open session on the same cell is cancelled first.
    ///
    /// # Errors
    ///
    /// - `InvalidColumnKey` / `InvalidConfig` for an unknown or
    ///   non-editable column.
    /// - `EditFailed` for an unknown row.
    pub fn begin_edit(&mut self, row_id: &RowId, column: &str) -> Result<EditSession> {
        let column = self.columns.require_capable(column, "editable", |c| c.editable)?;
        let row = self.row_index.get(row_id).map(|&i| &self.rows[i]).ok_or_else(|| {
            DataTableError::new(ErrorCode::EditFailed, format!("no row '{row_id}' to edit"))
                .with_context("row_id", row_id.as_str())
        })?;
        let original = column.resolve(row);
        Ok(self.edits.begin(row_id.clone(), &column.key, original).clone())
    }

    /// Changes the pending value of an open session and validates it with
    /// the bound [`CellValidator`](crate::edit::CellValidator), if any.
    pub fn update_edit(&mut self, row_id: &RowId, column: &str, value: Value) -> Result<EditSession> {
        let validator = self.collaborators.validator.clone();
        self.edits
            .update(row_id, column, value, validator.as_deref())
            .cloned()
    }

    /// Closes a session without committing.
    pub fn cancel_edit(&mut self, row_id: &RowId, column: &str) -> Option<EditSession> {
        self.edits.cancel(row_id, column)
    }

    /// The open session on a cell.
    pub fn edit_session(&self, row_id: &RowId, column: &str) -> Option<&EditSession> {
        self.edits.session(row_id, column)
    }

    /// Starts committing a session. Hand the ticket to
    /// [`finish_commit`](Self::finish_commit) with the persistence result.
    ///
    /// # Errors
    ///
    /// `CellValidationFailed` when the pending value did not validate,
    /// `EditFailed` when no session is open.
    pub fn begin_commit(&mut self, row_id: &RowId, column: &str) -> Result<CommitTicket> {
        self.edits.begin_commit(row_id, column)
    }

    /// Applies a persistence result.
    ///
    /// A committed value is written back into the row. A failure is
    /// reported to the error sink exactly once.
    pub fn finish_commit(
        &mut self,
        ticket: CommitTicket,
        result: std::result::Result<(), CallbackError>,
    ) -> EditOutcome {
        let row_id = ticket.row_id.clone();
        let column = ticket.column.clone();
        let outcome = self.edits.finish_commit(ticket, result, &self.registry);
        match &outcome {
            EditOutcome::Committed { value } => self.write_back(&row_id, &column, value.clone()),
            EditOutcome::RolledBack { .. } | EditOutcome::Retained { .. } => {
                if let Some(error) = outcome.error() {
                    log::warn!("{error}");
                    self.report(std::slice::from_ref(error));
                }
            }
            EditOutcome::Superseded => {}
        }
        outcome
    }

    /// Commits a session through the bound
    /// [`CellPersistence`](crate::edit::CellPersistence).
    ///
    /// Failed attempts are retried up to the EDIT_FAILED strategy's
    /// `max_attempts`. Teardown cancels the commit, which then reports
    /// [`EditOutcome::Superseded`].
    ///
    /// # Errors
    ///
    /// `ContextMissing` without persistence, or the errors of
    /// [`begin_commit`](Self::begin_commit).
    pub async fn commit_edit(&mut self, row_id: &RowId, column: &str) -> Result<EditOutcome> {
        let persistence = self.require(self.collaborators.persistence.clone(), "cell persistence")?;
        let ticket = self.begin_commit(row_id, column)?;
        let Some(row) = self.row(row_id).cloned() else {
            return Ok(self.finish_commit(ticket, Err("row disappeared before commit".into())));
        };
        let strategy = self.registry.strategy(ErrorCode::EditFailed);
        let cancel = self.cancel.clone();

        let mut attempt = 1;
        let result = loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => return Ok(EditOutcome::Superseded),
                result = guard_async(persistence.on_cell_change(row_id, column, &ticket.value, &row)) => result,
            };
            match result {
                Err(cause) if attempt < strategy.max_attempts => {
                    log::debug!(
                        "commit of {row_id}/{column} attempt {attempt}/{} failed: {cause}; retrying",
                        strategy.max_attempts
                    );
                    attempt += 1;
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(EditOutcome::Superseded),
                        _ = tokio::time::sleep(strategy.retry_delay) => {}
                    }
                }
                other => break other,
            }
        };
        Ok(self.finish_commit(ticket, result))
    }

    fn write_back(&mut self, row_id: &RowId, column: &str, value: Value) {
        let Some(col) = self.columns.get(column) else {
            return;
        };
        if col.accessor.is_some() {
            log::debug!("column '{column}' has an accessor; committed value not written back");
            return;
        }
        if let Some(&i) = self.row_index.get(row_id) {
            self.rows[i].set_path(column, value);
        }
    }
}
