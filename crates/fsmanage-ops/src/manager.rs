//! Entry point for running operation batches against a backend.

use std::fmt;
use std::sync::Arc;

use derive_builder::Builder;
use fsmanage_core::{Item, Metadata};
use fsmanage_history::HistoryConfig;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::DEFAULT_MAX_PARALLEL;
use crate::confirm::{ConfirmFn, Response, respond_always};
use crate::error::UsageError;
use crate::event::{FailurePolicy, OperationHistory, OperationHistoryEvent};
use crate::executor::{OperationExecutor, OperationOutcome};
use crate::operation::{Operation, OperationException, OperationKind};
use crate::task::Task;

fn default_max_parallel() -> usize {
    DEFAULT_MAX_PARALLEL
}

/// Configuration for an [`OperationManager`].
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ManagerConfig {
    /// Report attention items from undo passes.
    #[builder(default = "false")]
    #[serde(default)]
    pub undo_yields_attention: bool,

    /// What to do with completed operations when one in the batch fails.
    #[builder(default)]
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Maximum operations running at once in a parallel batch.
    #[builder(default = "DEFAULT_MAX_PARALLEL")]
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
}

impl ManagerConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(0) = self.max_parallel {
            return Err("max_parallel must be at least 1".to_string());
        }
        Ok(())
    }
}

impl ManagerConfig {
    /// Create a new manager config builder.
    pub fn builder() -> ManagerConfigBuilder {
        ManagerConfigBuilder::default()
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            undo_yields_attention: false,
            failure_policy: FailurePolicy::default(),
            max_parallel: DEFAULT_MAX_PARALLEL,
        }
    }
}

/// Per-batch options for [`OperationManager::execute`].
#[derive(Clone)]
pub struct BatchOptions {
    confirm: Option<ConfirmFn>,
    allow_parallel: bool,
    cancel: Option<CancellationToken>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            confirm: None,
            allow_parallel: true,
            cancel: None,
        }
    }
}

impl BatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver confirmations to `confirm` instead of auto-confirming.
    pub fn confirm(mut self, confirm: ConfirmFn) -> Self {
        self.confirm = Some(confirm);
        self
    }

    /// Run operations one after another.
    pub fn sequential(self) -> Self {
        self.allow_parallel(false)
    }

    pub fn allow_parallel(mut self, allow: bool) -> Self {
        self.allow_parallel = allow;
        self
    }

    /// Stop launching operations once `token` is cancelled.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

impl fmt::Debug for BatchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchOptions")
            .field("confirm", &self.confirm.is_some())
            .field("allow_parallel", &self.allow_parallel)
            .field("cancel", &self.cancel)
            .finish()
    }
}

/// Runs operation batches through a backend and records them in a history.
pub struct OperationManager {
    executor: Arc<OperationExecutor>,
    history: Arc<OperationHistory>,
    config: ManagerConfig,
}

impl OperationManager {
    /// Create a manager over `executor` recording into `history`.
    pub fn new(executor: OperationExecutor, history: OperationHistory, config: ManagerConfig) -> Self {
        Self {
            executor: Arc::new(executor),
            history: Arc::new(history),
            config,
        }
    }

    /// Create a manager with an unbounded history and default config.
    pub fn with_defaults(executor: OperationExecutor) -> Self {
        Self::new(
            executor,
            OperationHistory::new(HistoryConfig::default()),
            ManagerConfig::default(),
        )
    }

    /// The history batches are recorded in. Undo and redo go through it.
    pub fn history(&self) -> &Arc<OperationHistory> {
        &self.history
    }

    pub fn executor(&self) -> &Arc<OperationExecutor> {
        &self.executor
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Operation kinds the backend supports.
    pub fn supported_operations(&self) -> Vec<OperationKind> {
        self.executor.supported_operations()
    }

    /// Query backend metadata for `item`.
    pub fn get_metadata(&self, item: &Item, properties: &[&str]) -> Task<Metadata> {
        self.executor.get_metadata(item, properties)
    }

    /// Run `operations` as one undoable batch.
    ///
    /// Every operation is validated before anything runs; a batch that fails
    /// validation returns a [`UsageError`] and the backend is never called.
    /// The returned task resolves to the combined attention items, or to the
    /// exception of the operation that stopped the batch.
    pub fn execute(&self, operations: Vec<Operation>, options: BatchOptions) -> Result<Task<OperationOutcome>, UsageError> {
        let first = operations.first().cloned().ok_or(UsageError::EmptyBatch)?;

        let confirm = options
            .confirm
            .unwrap_or_else(|| respond_always(Response::Confirm));
        let mut event = OperationHistoryEvent::new(Arc::clone(&self.executor), operations, confirm)?
            .allow_parallel(options.allow_parallel)
            .max_parallel(self.config.max_parallel)
            .undo_yields_attention(self.config.undo_yields_attention)
            .failure_policy(self.config.failure_policy);
        if let Some(token) = options.cancel {
            event = event.cancel_token(token);
        }

        self.history
            .accepts(&event)
            .map_err(|_| UsageError::NotReversible)?;

        debug!(
            operations = event.operations().len(),
            parallel = options.allow_parallel,
            "submitting batch"
        );

        let history = Arc::clone(&self.history);
        let recovered = first.clone();
        Ok(Task::spawn(
            async move {
                match history.add(event).await {
                    Ok(result) => result.into_outcome(),
                    Err(err) => Err(OperationException::new(first, true).with_detail(err.to_string())),
                }
            },
            move |err| {
                Err(OperationException::new(recovered, false).with_detail(format!("batch task failed: {err}")))
            },
        ))
    }
}

impl fmt::Debug for OperationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationManager")
            .field("executor", &self.executor)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_rejects_zero_parallelism() {
        assert!(ManagerConfig::builder().max_parallel(0usize).build().is_err());
    }

    #[test]
    fn test_config_defaults() {
        let config = ManagerConfig::builder().build().unwrap();
        assert_eq!(config.max_parallel, DEFAULT_MAX_PARALLEL);
        assert_eq!(config.failure_policy, FailurePolicy::Revert);
        assert!(!config.undo_yields_attention);
    }

    #[test]
    fn test_config_from_json() {
        let config: ManagerConfig =
            serde_json::from_str(r#"{"failure_policy": "abandon"}"#).unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::Abandon);
        assert_eq!(config.max_parallel, DEFAULT_MAX_PARALLEL);
    }
}
