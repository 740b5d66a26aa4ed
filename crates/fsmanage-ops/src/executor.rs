//! Registry of backend functions per operation kind.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use fsmanage_core::{AttentionItems, Item, Metadata};
use fsmanage_history::BoxFuture;
use tracing::{debug, trace};

use crate::confirm::Confirmer;
use crate::error::UsageError;
use crate::operation::{Operation, OperationException, OperationKind};
use crate::task::Task;

/// Result of running one operation.
pub type OperationOutcome = Result<AttentionItems, OperationException>;

/// Backend function performing an operation.
pub type ExecuteFn =
    Arc<dyn Fn(Operation, Confirmer) -> BoxFuture<'static, OperationOutcome> + Send + Sync>;

/// Backend function reverting a previously executed operation.
pub type UndoFn = Arc<dyn Fn(Operation) -> BoxFuture<'static, OperationOutcome> + Send + Sync>;

/// Backend function answering metadata queries.
pub type MetadataFn = Arc<dyn Fn(Item, Vec<String>) -> BoxFuture<'static, Metadata> + Send + Sync>;

/// Box an async closure as an [`ExecuteFn`].
pub fn execute_fn<F, Fut>(f: F) -> ExecuteFn
where
    F: Fn(Operation, Confirmer) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = OperationOutcome> + Send + 'static,
{
    Arc::new(move |operation, confirmer| Box::pin(f(operation, confirmer)))
}

/// Box an async closure as an [`UndoFn`].
pub fn undo_fn<F, Fut>(f: F) -> UndoFn
where
    F: Fn(Operation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = OperationOutcome> + Send + 'static,
{
    Arc::new(move |operation| Box::pin(f(operation)))
}

/// Box an async closure as a [`MetadataFn`].
pub fn metadata_fn<F, Fut>(f: F) -> MetadataFn
where
    F: Fn(Item, Vec<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Metadata> + Send + 'static,
{
    Arc::new(move |item, properties| Box::pin(f(item, properties)))
}

#[derive(Clone)]
struct Handlers {
    execute: ExecuteFn,
    undo: Option<UndoFn>,
}

/// The set of operations a backend supports.
///
/// Registration happens while the executor is still owned; once shared with
/// a manager it is only read.
#[derive(Clone, Default)]
pub struct OperationExecutor {
    handlers: HashMap<OperationKind, Handlers>,
    metadata: Option<MetadataFn>,
}

impl OperationExecutor {
    /// Create an executor with no supported operations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the metadata function.
    pub fn with_metadata(mut self, metadata: MetadataFn) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Register (or replace) the functions for `kind`.
    pub fn support_operation(&mut self, kind: OperationKind, execute: ExecuteFn, undo: Option<UndoFn>) {
        debug!(%kind, undo = undo.is_some(), "registered operation");
        self.handlers.insert(kind, Handlers { execute, undo });
    }

    /// Builder-style [`support_operation`](Self::support_operation).
    pub fn supporting(mut self, kind: OperationKind, execute: ExecuteFn, undo: Option<UndoFn>) -> Self {
        self.support_operation(kind, execute, undo);
        self
    }

    /// Every registered operation kind, in a stable order.
    pub fn supported_operations(&self) -> Vec<OperationKind> {
        let mut kinds: Vec<_> = self.handlers.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Check if `kind` is registered.
    pub fn supports(&self, kind: OperationKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Check if `kind` is registered with an undo function.
    pub fn can_undo(&self, kind: OperationKind) -> bool {
        self.handlers
            .get(&kind)
            .is_some_and(|handlers| handlers.undo.is_some())
    }

    /// Start executing `operation`.
    pub fn execute(&self, operation: &Operation, confirmer: Confirmer) -> Result<Task<OperationOutcome>, UsageError> {
        let kind = operation.kind();
        let handlers = self
            .handlers
            .get(&kind)
            .ok_or(UsageError::UnsupportedOperation(kind))?;

        trace!(id = %operation.id(), %kind, "executing operation");
        let future = (handlers.execute)(operation.clone(), confirmer);
        Ok(spawn_outcome(operation, future))
    }

    /// Start undoing `operation`.
    pub fn undo(&self, operation: &Operation) -> Result<Task<OperationOutcome>, UsageError> {
        let kind = operation.kind();
        let undo = self
            .handlers
            .get(&kind)
            .ok_or(UsageError::UnsupportedOperation(kind))?
            .undo
            .as_ref()
            .ok_or(UsageError::UndoNotSupported(kind))?;

        trace!(id = %operation.id(), %kind, "undoing operation");
        let future = undo(operation.clone());
        Ok(spawn_outcome(operation, future))
    }

    /// Query metadata for `item`.
    ///
    /// With an empty `properties` list the backend returns everything it
    /// knows. Otherwise only the requested properties are kept; properties
    /// the backend cannot answer are omitted.
    pub fn get_metadata(&self, item: &Item, properties: &[&str]) -> Task<Metadata> {
        let requested: Vec<String> = properties.iter().map(|p| p.to_string()).collect();
        let Some(metadata) = self.metadata.as_ref() else {
            return Task::spawn(async { Metadata::new() }, |_| Metadata::new());
        };

        let future = metadata(item.clone(), requested.clone());
        Task::spawn(
            async move {
                let mut values = future.await;
                if !requested.is_empty() {
                    values.retain(|name, _| requested.contains(name));
                }
                values
            },
            |_| Metadata::new(),
        )
    }
}

fn spawn_outcome(operation: &Operation, future: BoxFuture<'static, OperationOutcome>) -> Task<OperationOutcome> {
    let failed = operation.clone();
    Task::spawn(future, move |err| {
        Err(OperationException::new(failed, false).with_detail(format!("backend task failed: {err}")))
    })
}

impl fmt::Debug for OperationExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationExecutor")
            .field("supported", &self.supported_operations())
            .field("metadata", &self.metadata.is_some())
            .finish()
    }
}
