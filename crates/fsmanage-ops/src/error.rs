//! Usage errors for the operation engine.

use fsmanage_core::ItemError;
use thiserror::Error;

use crate::operation::{OperationId, OperationKind};

/// A call that cannot proceed. Returned before any backend code runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("Operation not supported by this backend: {0}")]
    UnsupportedOperation(OperationKind),

    #[error("Undo not supported for operation: {0}")]
    UndoNotSupported(OperationKind),

    #[error("Confirmation has already been answered")]
    AlreadyResponded,

    #[error("Cannot execute an empty batch")]
    EmptyBatch,

    #[error("Operation {0} appears more than once in the batch")]
    DuplicateOperation(OperationId),

    #[error("History only accepts reversible batches")]
    NotReversible,

    #[error(transparent)]
    Item(#[from] ItemError),
}
