//! Per-cell edit state machine.

use std::collections::HashMap;

use super::CellKey;
use super::CellValidator;
use super::CommitTicket;
use super::EditOutcome;
use super::EditSession;
use super::EditState;
use crate::error::CallbackError;
use crate::error::DataTableError;
use crate::error::ErrorCode;
use crate::error::Result;
use crate::error::guard;
use crate::model::RowId;
use crate::model::Value;
use crate::recovery::Fallback;
use crate::recovery::Recovery;
use crate::recovery::RecoveryRegistry;

/// Open edit sessions, at most one per cell.
///
/// Commits are split in two so the persistence call can run outside any
/// borrow of the table: [`begin_commit`](Self::begin_commit) hands out a
/// [`CommitTicket`] and [`finish_commit`](Self::finish_commit) applies the
/// result. A ticket whose session was cancelled or replaced is discarded.
#[derive(Debug, Clone, Default)]
pub struct EditController {
    sessions: HashMap<CellKey, EditSession>,
    next_generation: u64,
}

impl EditController {
    /// Creates a controller with no open sessions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a session on a cell whose current value is `original`.
    ///
    /// An open session on the same cell is cancelled without committing.
    pub fn begin(&mut self, row_id: RowId, column: &str, original: Value) -> &EditSession {
        self.next_generation += 1;
        let key = (row_id.clone(), column.to_string());
        if self.sessions.contains_key(&key) {
            log::debug!("edit on {row_id}/{column} replaced an open session");
        }
        let session = EditSession {
            row_id,
            column: column.to_string(),
            pending_value: original.clone(),
            original_value: original,
            validation_error: None,
            state: EditState::Editing,
            generation: self.next_generation,
        };
        self.sessions.insert(key.clone(), session);
        &self.sessions[&key]
    }

    /// Changes the pending value and re-runs validation.
    ///
    /// A panicking validator counts as a validation failure.
    ///
    /// # Errors
    ///
    /// `EditFailed` when no session is open for editing on the cell.
    pub fn update(
        &mut self,
        row_id: &RowId,
        column: &str,
        value: Value,
        validator: Option<&dyn CellValidator>,
    ) -> Result<&EditSession> {
        let session = self.editing_mut(row_id, column)?;
        session.validation_error = validator.and_then(|v| {
            guard(|| Ok(v.validate(row_id, column, &value)))
                .unwrap_or_else(|cause| Some(format!("validator failed: {cause}")))
        });
        session.pending_value = value;
        Ok(session)
    }

    /// Closes the session on a cell without committing.
    pub fn cancel(&mut self, row_id: &RowId, column: &str) -> Option<EditSession> {
        self.sessions.remove(&(row_id.clone(), column.to_string()))
    }

    /// Cancels every session whose row fails `keep`. Returns the cancelled
    /// sessions.
    pub fn cancel_where(&mut self, keep: impl Fn(&RowId) -> bool) -> Vec<EditSession> {
        let doomed: Vec<CellKey> = self
            .sessions
            .keys()
            .filter(|(row_id, _)| !keep(row_id))
            .cloned()
            .collect();
        doomed
            .into_iter()
            .filter_map(|key| self.sessions.remove(&key))
            .inspect(|s| log::debug!("cancelled edit on {}/{}: row left the view", s.row_id, s.column))
            .collect()
    }

    /// Cancels every open session.
    pub fn cancel_all(&mut self) -> usize {
        let n = self.sessions.len();
        self.sessions.clear();
        n
    }

    /// The session on a cell.
    pub fn session(&self, row_id: &RowId, column: &str) -> Option<&EditSession> {
        self.sessions.get(&(row_id.clone(), column.to_string()))
    }

    /// All open sessions.
    pub fn sessions(&self) -> impl Iterator<Item = &EditSession> {
        self.sessions.values()
    }

    /// Starts committing the pending value.
    ///
    /// # Errors
    ///
    /// - `EditFailed` when no session is open for editing on the cell.
    /// - `CellValidationFailed` when the pending value did not validate; the
    ///   session stays in `Editing`.
    pub fn begin_commit(&mut self, row_id: &RowId, column: &str) -> Result<CommitTicket> {
        let session = self.editing_mut(row_id, column)?;
        if let Some(message) = &session.validation_error {
            return Err(DataTableError::new(
                ErrorCode::CellValidationFailed,
                format!("cannot commit {row_id}/{column}: {message}"),
            )
            .with_context("row_id", row_id.as_str())
            .with_context("column", column)
            .with_context("validation_error", message.as_str()));
        }
        session.state = EditState::Validating;
        Ok(CommitTicket {
            row_id: row_id.clone(),
            column: column.to_string(),
            value: session.pending_value.clone(),
            generation: session.generation,
        })
    }

    /// Applies the persistence `result` for `ticket`.
    ///
    /// On failure the EDIT_FAILED strategy decides. `KeepCurrent` leaves the
    /// session open with its pending value; anything else restores the
    /// original value and closes it. A self-healed failure rolls back
    /// without an error to surface.
    pub fn finish_commit(
        &mut self,
        ticket: CommitTicket,
        result: std::result::Result<(), CallbackError>,
        registry: &RecoveryRegistry,
    ) -> EditOutcome {
        let key = (ticket.row_id.clone(), ticket.column.clone());
        let current = self
            .sessions
            .get(&key)
            .is_some_and(|s| s.generation == ticket.generation && s.state == EditState::Validating);
        if !current {
            log::debug!("discarding stale commit result for {}/{}", ticket.row_id, ticket.column);
            return EditOutcome::Superseded;
        }

        let cause = match result {
            Ok(()) => {
                self.sessions.remove(&key);
                return EditOutcome::Committed {
                    value: ticket.value,
                };
            }
            Err(cause) => cause,
        };

        let error = DataTableError::new(
            ErrorCode::EditFailed,
            format!("saving {}/{} failed: {cause}", ticket.row_id, ticket.column),
        )
        .with_context("row_id", ticket.row_id.as_str())
        .with_context("column", ticket.column.as_str())
        .with_cause(cause);

        match registry.handle(&error) {
            Recovery::Fallback(Fallback::KeepCurrent) => {
                if let Some(session) = self.sessions.get_mut(&key) {
                    session.state = EditState::Editing;
                }
                EditOutcome::Retained { error }
            }
            Recovery::Healed => {
                log::debug!("self-healed {error}");
                EditOutcome::RolledBack {
                    original: self.roll_back(&key),
                    error: None,
                }
            }
            Recovery::Fallback(_) => EditOutcome::RolledBack {
                original: self.roll_back(&key),
                error: Some(error),
            },
        }
    }

    fn roll_back(&mut self, key: &CellKey) -> Value {
        self.sessions
            .remove(key)
            .map(|s| s.original_value)
            .unwrap_or_default()
    }

    fn editing_mut(&mut self, row_id: &RowId, column: &str) -> Result<&mut EditSession> {
        self.sessions
            .get_mut(&(row_id.clone(), column.to_string()))
            .filter(|s| s.state == EditState::Editing)
            .ok_or_else(|| {
                DataTableError::new(
                    ErrorCode::EditFailed,
                    format!("no open edit on {row_id}/{column}"),
                )
                .with_context("row_id", row_id.as_str())
                .with_context("column", column)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::RecoveryStrategy;

    fn io_error(msg: &str) -> CallbackError {
        Box::new(std::io::Error::other(msg.to_string()))
    }

    fn open(controller: &mut EditController) -> RowId {
        let id = RowId::from(1);
        controller.begin(id.clone(), "amt", Value::Int(10));
        id
    }

    #[test]
    fn test_begin_snapshots_original() {
        let mut controller = EditController::new();
        let id = open(&mut controller);
        let session = controller.session(&id, "amt").unwrap();
        assert_eq!(session.original_value, Value::Int(10));
        assert_eq!(session.pending_value, Value::Int(10));
        assert_eq!(session.state, EditState::Editing);
        assert!(!session.is_dirty());
    }

    #[test]
    fn test_validator_blocks_commit() {
        let mut controller = EditController::new();
        let id = open(&mut controller);
        let positive = |_: &RowId, _: &str, v: &Value| -> Option<String> {
            match v.as_f64() {
                Some(n) if n > 0.0 => None,
                _ => Some("must be positive".to_string()),
            }
        };

        let session = controller
            .update(&id, "amt", Value::Int(-5), Some(&positive))
            .unwrap();
        assert_eq!(session.validation_error.as_deref(), Some("must be positive"));
        assert!(!session.can_commit());

        let err = controller.begin_commit(&id, "amt").unwrap_err();
        assert_eq!(err.code, ErrorCode::CellValidationFailed);
        assert_eq!(controller.session(&id, "amt").unwrap().state, EditState::Editing);

        controller.update(&id, "amt", Value::Int(5), Some(&positive)).unwrap();
        assert!(controller.begin_commit(&id, "amt").is_ok());
    }

    #[test]
    fn test_panicking_validator_blocks_commit() {
        let mut controller = EditController::new();
        let id = open(&mut controller);
        let broken = |_: &RowId, _: &str, _: &Value| -> Option<String> { panic!("boom") };
        let session = controller.update(&id, "amt", Value::Int(1), Some(&broken)).unwrap();
        assert!(session.validation_error.as_deref().unwrap().contains("boom"));
    }

    #[test]
    fn test_successful_commit_closes_session() {
        let mut controller = EditController::new();
        let id = open(&mut controller);
        controller.update(&id, "amt", Value::Int(11), None).unwrap();
        let ticket = controller.begin_commit(&id, "amt").unwrap();
        assert_eq!(controller.session(&id, "amt").unwrap().state, EditState::Validating);

        let outcome = controller.finish_commit(ticket, Ok(()), &RecoveryRegistry::default());
        assert!(matches!(outcome, EditOutcome::Committed { value: Value::Int(11) }));
        assert_eq!(outcome.final_state(), Some(EditState::Committed));
        assert!(controller.session(&id, "amt").is_none());
    }

    #[test]
    fn test_failed_commit_rolls_back() {
        let mut controller = EditController::new();
        let id = open(&mut controller);
        controller.update(&id, "amt", Value::Int(99), None).unwrap();
        let ticket = controller.begin_commit(&id, "amt").unwrap();

        let outcome = controller.finish_commit(ticket, Err(io_error("disk full")), &RecoveryRegistry::default());
        match &outcome {
            EditOutcome::RolledBack { original, error } => {
                assert_eq!(original, &Value::Int(10));
                let error = error.as_ref().unwrap();
                assert_eq!(error.code, ErrorCode::EditFailed);
                assert_eq!(error.context_value("column"), Some(&serde_json::json!("amt")));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(controller.session(&id, "amt").is_none());
    }

    #[test]
    fn test_keep_current_retains_session() {
        let registry = RecoveryRegistry::default()
            .with_strategy(ErrorCode::EditFailed, RecoveryStrategy::new(Fallback::KeepCurrent));
        let mut controller = EditController::new();
        let id = open(&mut controller);
        controller.update(&id, "amt", Value::Int(99), None).unwrap();
        let ticket = controller.begin_commit(&id, "amt").unwrap();

        let outcome = controller.finish_commit(ticket, Err(io_error("offline")), &registry);
        assert!(matches!(outcome, EditOutcome::Retained { .. }));
        let session = controller.session(&id, "amt").unwrap();
        assert_eq!(session.state, EditState::Editing);
        assert_eq!(session.pending_value, Value::Int(99));
    }

    #[test]
    fn test_healed_failure_rolls_back_silently() {
        let registry = RecoveryRegistry::default().with_strategy(
            ErrorCode::EditFailed,
            RecoveryStrategy::new(Fallback::Rollback).with_recover(|_| true),
        );
        let mut controller = EditController::new();
        let id = open(&mut controller);
        let ticket = controller.begin_commit(&id, "amt").unwrap();
        let outcome = controller.finish_commit(ticket, Err(io_error("flaky")), &registry);
        assert!(matches!(outcome, EditOutcome::RolledBack { error: None, .. }));
        assert!(outcome.error().is_none());
    }

    #[test]
    fn test_new_session_supersedes_inflight_commit() {
        let mut controller = EditController::new();
        let id = open(&mut controller);
        let stale = controller.begin_commit(&id, "amt").unwrap();

        controller.begin(id.clone(), "amt", Value::Int(10));
        controller.update(&id, "amt", Value::Int(12), None).unwrap();

        let outcome = controller.finish_commit(stale, Err(io_error("late")), &RecoveryRegistry::default());
        assert!(matches!(outcome, EditOutcome::Superseded));
        assert_eq!(controller.session(&id, "amt").unwrap().pending_value, Value::Int(12));
    }

    #[test]
    fn test_cancel_where_drops_missing_rows() {
        let mut controller = EditController::new();
        controller.begin(RowId::from(1), "amt", Value::Int(1));
        controller.begin(RowId::from(2), "amt", Value::Int(2));
        let cancelled = controller.cancel_where(|id| id.as_str() == "1");
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].row_id, RowId::from(2));
        assert!(controller.session(&RowId::from(1), "amt").is_some());
    }

    #[test]
    fn test_update_without_session_fails() {
        let mut controller = EditController::new();
        let err = controller
            .update(&RowId::from(7), "amt", Value::Null, None)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EditFailed);
    }
}
