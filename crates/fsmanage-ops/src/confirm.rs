//! Confirmation requests raised by backends during a pass.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Notify, oneshot};
use tracing::{trace, warn};

use crate::error::UsageError;

/// What a confirmation asks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfirmationKind {
    /// The destination already exists and would be replaced.
    Overwrite,
    /// A non-empty directory would be removed.
    Delete,
    /// A directory would be merged into an existing one.
    MergeDirectory,
    /// Backend-defined question.
    Other(&'static str),
}

impl ConfirmationKind {
    /// Default label for the affirmative answer.
    pub fn yes_text(&self) -> &'static str {
        match self {
            Self::Overwrite => "Overwrite",
            Self::Delete => "Delete",
            Self::MergeDirectory => "Merge",
            Self::Other(_) => "Yes",
        }
    }

    /// Default label for the negative answer.
    pub fn no_text(&self) -> &'static str {
        match self {
            Self::Overwrite | Self::Delete | Self::MergeDirectory => "Cancel",
            Self::Other(_) => "No",
        }
    }
}

impl fmt::Display for ConfirmationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overwrite => write!(f, "overwrite"),
            Self::Delete => write!(f, "delete"),
            Self::MergeDirectory => write!(f, "merge_directory"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

/// An answer to a confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Response {
    Confirm,
    Reject,
    /// Confirm this and every later question of the same kind in the pass.
    ConfirmAll,
}

impl Response {
    /// Check if the answer allows the change.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirm | Self::ConfirmAll)
    }
}

/// A question delivered to the confirm callback.
///
/// It can be answered exactly once, from any thread and at any later time.
/// Dropping it unanswered counts as a rejection.
#[derive(Debug)]
pub struct Confirmation {
    kind: ConfirmationKind,
    description: String,
    yes_text: String,
    no_text: String,
    reply: Mutex<Option<oneshot::Sender<Response>>>,
}

impl Confirmation {
    fn new(kind: ConfirmationKind, description: String, reply: oneshot::Sender<Response>) -> Self {
        Self {
            kind,
            description,
            yes_text: kind.yes_text().to_string(),
            no_text: kind.no_text().to_string(),
            reply: Mutex::new(Some(reply)),
        }
    }

    pub fn kind(&self) -> ConfirmationKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn yes_text(&self) -> &str {
        &self.yes_text
    }

    pub fn no_text(&self) -> &str {
        &self.no_text
    }

    /// Answer the question.
    ///
    /// Fails with [`UsageError::AlreadyResponded`] on every call after the
    /// first.
    pub fn respond(&self, response: Response) -> Result<(), UsageError> {
        let sender = self
            .reply
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(UsageError::AlreadyResponded)?;
        if sender.send(response).is_err() {
            trace!(kind = %self.kind, "confirmation answered after the pass stopped waiting");
        }
        Ok(())
    }

    /// Check if the question has been answered.
    pub fn is_answered(&self) -> bool {
        self.reply
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// Callback receiving confirmations.
pub type ConfirmFn = Arc<dyn Fn(Confirmation) + Send + Sync>;

/// A confirm callback that gives the same answer to every question.
pub fn respond_always(response: Response) -> ConfirmFn {
    Arc::new(move |confirmation: Confirmation| {
        let _ = confirmation.respond(response);
    })
}

/// Asks questions on behalf of one pass over a batch.
///
/// Cloned handles share the same confirm-all scope, so a `ConfirmAll` given
/// to one operation of the pass applies to the others, including questions
/// of that kind still waiting for an answer.
#[derive(Clone)]
pub struct Confirmer {
    callback: ConfirmFn,
    confirmed_all: Arc<Mutex<HashSet<ConfirmationKind>>>,
    confirmed_changed: Arc<Notify>,
}

impl Confirmer {
    /// Start a fresh scope around `callback`.
    pub fn new(callback: ConfirmFn) -> Self {
        Self {
            callback,
            confirmed_all: Arc::new(Mutex::new(HashSet::new())),
            confirmed_changed: Arc::new(Notify::new()),
        }
    }

    /// A scope that confirms everything.
    pub fn auto() -> Self {
        Self::new(respond_always(Response::Confirm))
    }

    /// Check if `kind` has been confirmed for the rest of the scope.
    pub fn is_confirmed_all(&self, kind: ConfirmationKind) -> bool {
        self.confirmed_all
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&kind)
    }

    /// Ask a question and wait for the answer.
    ///
    /// Questions of a kind already answered with `ConfirmAll` resolve to
    /// `Confirm` without reaching the callback. A question still waiting when
    /// another handle records `ConfirmAll` for its kind resolves to `Confirm`
    /// too; a later answer to it is ignored.
    pub async fn ask(&self, kind: ConfirmationKind, description: impl Into<String>) -> Response {
        if self.is_confirmed_all(kind) {
            trace!(%kind, "confirmation resolved by earlier confirm-all");
            return Response::Confirm;
        }

        let (tx, mut rx) = oneshot::channel();
        (self.callback)(Confirmation::new(kind, description.into(), tx));

        let response = loop {
            let changed = self.confirmed_changed.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();

            if self.is_confirmed_all(kind) {
                trace!(%kind, "waiting confirmation resolved by confirm-all");
                break Response::Confirm;
            }

            tokio::select! {
                reply = &mut rx => break match reply {
                    Ok(response) => response,
                    Err(_) => {
                        warn!(%kind, "confirmation dropped without an answer, treating as reject");
                        Response::Reject
                    }
                },
                () = &mut changed => continue,
            }
        };

        if response == Response::ConfirmAll {
            self.confirmed_all
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(kind);
            self.confirmed_changed.notify_waiters();
        }
        response
    }
}

impl fmt::Debug for Confirmer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Confirmer")
            .field("confirmed_all", &self.confirmed_all)
            .finish_non_exhaustive()
    }
}
