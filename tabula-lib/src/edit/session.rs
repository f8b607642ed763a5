//! Edit session state.

use serde::Serialize;

use crate::error::DataTableError;
use crate::model::RowId;
use crate::model::Value;

/// Lifecycle of a cell edit.
///
/// Open sessions are `Editing` or `Validating`. Committed and rolled-back
/// sessions are closed and the cell returns to idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditState {
    /// The user is changing the value.
    Editing,
    /// A commit is in flight.
    Validating,
    /// The value was persisted.
    Committed,
    /// The value was restored to the original.
    RolledBack,
}

/// Identifies a cell.
pub type CellKey = (RowId, String);

/// An open edit on one cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditSession {
    /// Row being edited.
    pub row_id: RowId,
    /// Column being edited.
    pub column: String,
    /// Value when the session started.
    pub original_value: Value,
    /// Value as currently edited.
    pub pending_value: Value,
    /// Message from the validator, if the pending value is invalid.
    pub validation_error: Option<String>,
    /// Current state.
    pub state: EditState,
    /// Distinguishes this session from earlier ones on the same cell.
    pub generation: u64,
}

impl EditSession {
    /// Returns `true` if the pending value may be committed.
    pub fn can_commit(&self) -> bool {
        self.state == EditState::Editing && self.validation_error.is_none()
    }

    /// Returns `true` if the pending value differs from the original.
    pub fn is_dirty(&self) -> bool {
        self.pending_value != self.original_value
    }
}

/// Proof that a commit was started for a specific session.
///
/// Handing it back to `finish_commit` applies the persistence result, unless
/// the session was cancelled or replaced in the meantime.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitTicket {
    /// Row being committed.
    pub row_id: RowId,
    /// Column being committed.
    pub column: String,
    /// Value being committed.
    pub value: Value,
    /// Generation of the session the ticket belongs to.
    pub generation: u64,
}

/// How a commit ended.
#[derive(Debug, Clone)]
pub enum EditOutcome {
    /// The value was persisted.
    Committed {
        /// The committed value.
        value: Value,
    },
    /// Persistence failed and the cell shows its original value again.
    RolledBack {
        /// The restored value.
        original: Value,
        /// The failure, or `None` if the error healed itself.
        error: Option<DataTableError>,
    },
    /// Persistence failed; the session stays open with its pending value.
    Retained {
        /// The failure.
        error: DataTableError,
    },
    /// The session was cancelled or replaced before the result arrived; the
    /// result was discarded.
    Superseded,
}

impl EditOutcome {
    /// State the cell's session ended in, or `None` if the result was
    /// discarded.
    pub fn final_state(&self) -> Option<EditState> {
        match self {
            EditOutcome::Committed { .. } => Some(EditState::Committed),
            EditOutcome::RolledBack { .. } => Some(EditState::RolledBack),
            EditOutcome::Retained { .. } => Some(EditState::Editing),
            EditOutcome::Superseded => None,
        }
    }

    /// The error to surface to the host, if any.
    pub fn error(&self) -> Option<&DataTableError> {
        match self {
            EditOutcome::RolledBack { error, .. } => error.as_ref(),
            EditOutcome::Retained { error } => Some(error),
            _ => None,
        }
    }
}
