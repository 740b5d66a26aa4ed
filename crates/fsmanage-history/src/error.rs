//! History usage errors.

use thiserror::Error;

/// Errors for history calls that cannot proceed.
///
/// These are returned before any event code runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// There is no past event to undo.
    #[error("Nothing to undo")]
    NothingToUndo,

    /// There is no future event to redo.
    #[error("Nothing to redo")]
    NothingToRedo,

    /// The most recent event does not support undo.
    #[error("The most recent event cannot be undone")]
    NotUndoable,

    /// The history only accepts events that support undo.
    #[error("History requires reversible events")]
    NotReversible,

    /// The history is permanent and never offers undo or redo.
    #[error("History is permanent")]
    Permanent,
}
