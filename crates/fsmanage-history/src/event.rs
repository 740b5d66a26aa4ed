//! History event trait and result types.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Type alias for boxed futures returned by event methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome tag for an execute or undo pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventState {
    /// The pass completed.
    Success,
    /// The pass failed and every change it made was reverted.
    Reverted,
    /// The pass failed and state may have been left changed.
    Failed,
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Reverted => write!(f, "reverted"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Result of executing or undoing a history event.
#[derive(Debug, Clone)]
pub struct HistoryEventResult<T, E> {
    state: EventState,
    outcome: Result<T, E>,
}

impl<T, E> HistoryEventResult<T, E> {
    /// A successful pass.
    pub fn success(value: T) -> Self {
        Self {
            state: EventState::Success,
            outcome: Ok(value),
        }
    }

    /// A failed pass whose changes were all reverted.
    pub fn reverted(error: E) -> Self {
        Self {
            state: EventState::Reverted,
            outcome: Err(error),
        }
    }

    /// A failed pass that may have left changes behind.
    pub fn failed(error: E) -> Self {
        Self {
            state: EventState::Failed,
            outcome: Err(error),
        }
    }

    /// The outcome tag.
    pub fn state(&self) -> EventState {
        self.state
    }

    /// Check if the pass succeeded.
    pub fn is_success(&self) -> bool {
        self.state == EventState::Success
    }

    /// Borrow the underlying value or error.
    pub fn outcome(&self) -> Result<&T, &E> {
        self.outcome.as_ref()
    }

    /// Take the underlying value or error.
    pub fn into_outcome(self) -> Result<T, E> {
        self.outcome
    }
}

/// Something that can be recorded in a [`History`](crate::History).
///
/// Both passes return futures that own everything they need, so events are
/// shared behind an [`Arc`] and may be run again (redo) after an undo.
pub trait HistoryEvent: Send + Sync + 'static {
    /// Value produced by a successful pass.
    type Output: Send + 'static;
    /// Error produced by a failed pass.
    type Error: Send + 'static;

    /// Run the event.
    fn execute(self: Arc<Self>) -> BoxFuture<'static, HistoryEventResult<Self::Output, Self::Error>>;

    /// Whether [`undo`](Self::undo) is supported.
    fn can_undo(&self) -> bool {
        true
    }

    /// Revert the event.
    ///
    /// Only called by the history when [`can_undo`](Self::can_undo) is true.
    fn undo(self: Arc<Self>) -> BoxFuture<'static, HistoryEventResult<Self::Output, Self::Error>>;
}
