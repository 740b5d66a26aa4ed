//! A batch of operations recorded as one history event.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use fsmanage_core::AttentionItems;
use fsmanage_history::{BoxFuture, History, HistoryEvent, HistoryEventResult};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::DEFAULT_MAX_PARALLEL;
use crate::confirm::{ConfirmFn, Confirmer};
use crate::error::UsageError;
use crate::executor::{OperationExecutor, OperationOutcome};
use crate::operation::{Operation, OperationException, OperationId};
use crate::task::Task;

/// History of operation batches.
pub type OperationHistory = History<OperationHistoryEvent>;

type BatchResult = HistoryEventResult<AttentionItems, OperationException>;

/// What to do with already-completed operations when one in the batch fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Undo completed operations in reverse order.
    #[default]
    Revert,
    /// Leave completed operations in place.
    Abandon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Execute,
    Undo,
}

struct Completed {
    index: usize,
    operation: Operation,
    attention: AttentionItems,
}

/// A batch of operations executed and undone as a unit.
///
/// The execute pass runs every operation not yet applied, in batch order.
/// The undo pass reverts every applied operation in reverse batch order.
/// Each pass starts a fresh confirm-all scope.
pub struct OperationHistoryEvent {
    executor: Arc<OperationExecutor>,
    operations: Vec<Operation>,
    confirm: ConfirmFn,
    allow_parallel: bool,
    max_parallel: usize,
    undo_yields_attention: bool,
    failure_policy: FailurePolicy,
    cancel: CancellationToken,
    applied: Mutex<HashSet<OperationId>>,
}

impl OperationHistoryEvent {
    /// Create a sequential batch.
    ///
    /// Fails if the batch is empty, lists the same operation twice, or holds
    /// an operation kind `executor` does not support. Nothing runs until the
    /// event is added to a history.
    pub fn new(
        executor: Arc<OperationExecutor>,
        operations: Vec<Operation>,
        confirm: ConfirmFn,
    ) -> Result<Self, UsageError> {
        if operations.is_empty() {
            return Err(UsageError::EmptyBatch);
        }
        let mut seen = HashSet::with_capacity(operations.len());
        for operation in &operations {
            if !seen.insert(operation.id()) {
                return Err(UsageError::DuplicateOperation(operation.id()));
            }
            if !executor.supports(operation.kind()) {
                return Err(UsageError::UnsupportedOperation(operation.kind()));
            }
        }

        Ok(Self {
            executor,
            operations,
            confirm,
            allow_parallel: false,
            max_parallel: DEFAULT_MAX_PARALLEL,
            undo_yields_attention: false,
            failure_policy: FailurePolicy::default(),
            cancel: CancellationToken::new(),
            applied: Mutex::new(HashSet::new()),
        })
    }

    /// Allow operations to run concurrently.
    pub fn allow_parallel(mut self, allow: bool) -> Self {
        self.allow_parallel = allow;
        self
    }

    /// Limit the number of operations running at once in parallel mode.
    pub fn max_parallel(mut self, max: usize) -> Self {
        self.max_parallel = max.max(1);
        self
    }

    /// Report attention items from the undo pass.
    pub fn undo_yields_attention(mut self, yields: bool) -> Self {
        self.undo_yields_attention = yields;
        self
    }

    /// Set what happens to completed operations when one fails.
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Stop launching operations once `token` is cancelled.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The operations in batch order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Check if `operation` is currently applied.
    pub fn is_applied(&self, operation: &Operation) -> bool {
        self.applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&operation.id())
    }

    fn mark(&self, pass: Pass, operation: &Operation) {
        let mut applied = self.applied.lock().unwrap_or_else(PoisonError::into_inner);
        match pass {
            Pass::Execute => applied.insert(operation.id()),
            Pass::Undo => applied.remove(&operation.id()),
        };
    }

    fn pending(&self, pass: Pass) -> Vec<(usize, Operation)> {
        let applied = self.applied.lock().unwrap_or_else(PoisonError::into_inner);
        let indexed = self.operations.iter().cloned().enumerate();
        match pass {
            Pass::Execute => indexed.filter(|(_, op)| !applied.contains(&op.id())).collect(),
            Pass::Undo => indexed.rev().filter(|(_, op)| applied.contains(&op.id())).collect(),
        }
    }

    fn start(&self, pass: Pass, operation: &Operation, confirmer: &Confirmer) -> Result<Task<OperationOutcome>, UsageError> {
        match pass {
            Pass::Execute => self.executor.execute(operation, confirmer.clone()),
            Pass::Undo => self.executor.undo(operation),
        }
    }

    /// Start `operation` unless the batch was cancelled.
    ///
    /// Kinds were checked in [`new`](Self::new) and the undo pass only runs
    /// when every kind has an undo function, so a usage error here means the
    /// operation never started and changed nothing.
    fn launch_check(&self, pass: Pass, operation: &Operation, confirmer: &Confirmer) -> Result<Task<OperationOutcome>, OperationException> {
        if self.cancel.is_cancelled() {
            debug!(id = %operation.id(), "batch cancelled before operation started");
            return Err(OperationException::new(operation.clone(), true).with_detail("batch cancelled"));
        }
        self.start(pass, operation, confirmer).map_err(|err| {
            warn!(id = %operation.id(), error = %err, "operation could not be started");
            OperationException::new(operation.clone(), true).with_detail(err.to_string())
        })
    }

    async fn run(&self, pass: Pass) -> BatchResult {
        let pending = self.pending(pass);
        let confirmer = Confirmer::new(Arc::clone(&self.confirm));
        debug!(?pass, operations = pending.len(), parallel = self.allow_parallel, "starting batch pass");

        let (mut completed, failures) = if self.allow_parallel {
            self.run_parallel(pass, pending, &confirmer).await
        } else {
            self.run_sequential(pass, pending, &confirmer).await
        };
        completed.sort_by_key(|done| done.index);

        let Some(trigger) = failures.first().cloned() else {
            debug!(?pass, completed = completed.len(), "batch pass succeeded");
            if pass == Pass::Undo && !self.undo_yields_attention {
                return HistoryEventResult::success(AttentionItems::empty());
            }
            let attention = completed
                .into_iter()
                .fold(AttentionItems::empty(), |mut acc, done| {
                    acc.extend(done.attention);
                    acc
                });
            return HistoryEventResult::success(attention);
        };

        warn!(
            ?pass,
            operation = %trigger.operation(),
            completed = completed.len(),
            policy = ?self.failure_policy,
            "batch pass failed"
        );
        let rolled_back = match self.failure_policy {
            FailurePolicy::Revert => self.rollback(pass, &completed, &confirmer).await,
            FailurePolicy::Abandon => completed.is_empty(),
        };

        let reverted = rolled_back && failures.iter().all(OperationException::reverted);
        let error = trigger.with_reverted(reverted);
        if reverted {
            HistoryEventResult::reverted(error)
        } else {
            HistoryEventResult::failed(error)
        }
    }

    async fn run_sequential(
        &self,
        pass: Pass,
        pending: Vec<(usize, Operation)>,
        confirmer: &Confirmer,
    ) -> (Vec<Completed>, Vec<OperationException>) {
        let mut completed = Vec::new();
        for (index, operation) in pending {
            let outcome = match self.launch_check(pass, &operation, confirmer) {
                Ok(task) => task.await,
                Err(err) => Err(err),
            };
            match outcome {
                Ok(attention) => {
                    self.mark(pass, &operation);
                    completed.push(Completed {
                        index,
                        operation,
                        attention,
                    });
                }
                Err(err) => return (completed, vec![err]),
            }
        }
        (completed, Vec::new())
    }

    async fn run_parallel(
        &self,
        pass: Pass,
        pending: Vec<(usize, Operation)>,
        confirmer: &Confirmer,
    ) -> (Vec<Completed>, Vec<OperationException>) {
        let mut completed = Vec::new();
        let mut failures = Vec::new();
        let mut pending = pending.into_iter();
        let mut running = FuturesUnordered::new();

        loop {
            while failures.is_empty() && running.len() < self.max_parallel {
                let Some((index, operation)) = pending.next() else {
                    break;
                };
                match self.launch_check(pass, &operation, confirmer) {
                    Ok(task) => running.push(async move { (index, operation, task.await) }),
                    Err(err) => failures.push(err),
                }
            }

            // Once a failure is seen nothing new starts; in-flight operations
            // are still awaited so their effects can be rolled back.
            let Some((index, operation, outcome)) = running.next().await else {
                break;
            };
            match outcome {
                Ok(attention) => {
                    self.mark(pass, &operation);
                    completed.push(Completed {
                        index,
                        operation,
                        attention,
                    });
                }
                Err(err) => failures.push(err),
            }
        }
        (completed, failures)
    }

    /// Revert the completed part of a failed pass. Returns true if every
    /// step succeeded.
    async fn rollback(&self, pass: Pass, completed: &[Completed], confirmer: &Confirmer) -> bool {
        let reverse = match pass {
            Pass::Execute => Pass::Undo,
            Pass::Undo => Pass::Execute,
        };
        let mut steps: Vec<&Completed> = completed.iter().collect();
        if pass == Pass::Execute {
            steps.reverse();
        }

        let mut all_ok = true;
        for done in steps {
            let outcome = match self.start(reverse, &done.operation, confirmer) {
                Ok(task) => task.await,
                Err(err) => {
                    warn!(operation = %done.operation, error = %err, "cannot roll back operation");
                    all_ok = false;
                    continue;
                }
            };
            match outcome {
                Ok(_) => self.mark(reverse, &done.operation),
                Err(err) => {
                    warn!(operation = %done.operation, error = %err, "rollback step failed");
                    all_ok = false;
                }
            }
        }
        all_ok
    }
}

impl HistoryEvent for OperationHistoryEvent {
    type Output = AttentionItems;
    type Error = OperationException;

    fn execute(self: Arc<Self>) -> BoxFuture<'static, BatchResult> {
        Box::pin(async move { self.run(Pass::Execute).await })
    }

    fn can_undo(&self) -> bool {
        self.operations
            .iter()
            .all(|operation| self.executor.can_undo(operation.kind()))
    }

    fn undo(self: Arc<Self>) -> BoxFuture<'static, BatchResult> {
        Box::pin(async move { self.run(Pass::Undo).await })
    }
}

impl fmt::Debug for OperationHistoryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationHistoryEvent")
            .field("operations", &self.operations)
            .field("allow_parallel", &self.allow_parallel)
            .field("failure_policy", &self.failure_policy)
            .finish_non_exhaustive()
    }
}
