//! File operation engine for fsmanage.
//!
//! Operations are value objects describing one change to a filesystem-like
//! backend. A backend registers asynchronous execute (and optionally undo)
//! functions per [`OperationKind`] on an [`OperationExecutor`]. The
//! [`OperationManager`] turns a batch of operations into a single
//! [`OperationHistoryEvent`] recorded in a history, so one undo reverts the
//! whole batch.
//!
//! Confirmations are delivered to a caller-supplied callback as
//! [`Confirmation`] objects that are answered exactly once. Answering with
//! [`Response::ConfirmAll`] suppresses further questions of the same kind for
//! the rest of the current pass.
//!
//! [`MemoryFs`] is an in-memory backend implementing every operation kind.

mod confirm;
mod error;
mod event;
mod executor;
mod filter;
mod manager;
mod memory;
mod navigation;
mod operation;
mod task;

pub use confirm::{
    ConfirmFn, Confirmation, ConfirmationKind, Confirmer, Response, respond_always,
};
pub use error::UsageError;
pub use event::{FailurePolicy, OperationHistory, OperationHistoryEvent};
pub use executor::{
    ExecuteFn, MetadataFn, OperationExecutor, OperationOutcome, UndoFn, execute_fn, metadata_fn,
    undo_fn,
};
pub use filter::{
    ItemFilter, NamePattern, PathPattern, PredicateFn, RenderFn, ValuePattern, match_item_metadata,
    match_item_name, match_item_path, render_path, render_path_posix, render_path_windows,
};
pub use manager::{BatchOptions, ManagerConfig, ManagerConfigBuilder, OperationManager};
pub use memory::MemoryFs;
pub use navigation::{NavigationEvent, NavigationHistory, NavigationRoot};
pub use operation::{FileOperation, Operation, OperationException, OperationId, OperationKind};
pub use task::Task;

/// Default number of operations a parallel batch runs at once.
pub const DEFAULT_MAX_PARALLEL: usize = 8;
