//! Operation value objects and the failure type they report.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use fsmanage_core::{ItemError, OperableItem};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

static NEXT_OPERATION_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a single operation instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationId(u64);

impl OperationId {
    fn next() -> Self {
        Self(NEXT_OPERATION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw identifier.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The closed set of operation types a backend can register.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Copy,
    Move,
    Rename,
    Delete,
    CreateFile,
    CreateDirectory,
}

/// What an operation does, with its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FileOperation {
    /// Copy `source` to `destination` (the full target path).
    Copy {
        source: OperableItem,
        destination: OperableItem,
    },
    /// Move `source` to `destination` (the full target path).
    Move {
        source: OperableItem,
        destination: OperableItem,
    },
    /// Give `item` a new last component.
    Rename { item: OperableItem, new_name: String },
    /// Remove `item` and everything below it.
    Delete { item: OperableItem },
    /// Create an empty file.
    CreateFile { item: OperableItem },
    /// Create an empty directory.
    CreateDirectory { item: OperableItem },
}

impl FileOperation {
    /// The operation type.
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Copy { .. } => OperationKind::Copy,
            Self::Move { .. } => OperationKind::Move,
            Self::Rename { .. } => OperationKind::Rename,
            Self::Delete { .. } => OperationKind::Delete,
            Self::CreateFile { .. } => OperationKind::CreateFile,
            Self::CreateDirectory { .. } => OperationKind::CreateDirectory,
        }
    }
}

/// A single operation instance.
///
/// Two operations with the same arguments are still distinct; equality is by
/// identity so a batch can track which of its members have been applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    #[serde(skip, default = "OperationId::next")]
    id: OperationId,
    #[serde(flatten)]
    op: FileOperation,
}

impl Operation {
    /// Wrap a file operation with a fresh identity.
    pub fn new(op: FileOperation) -> Self {
        Self {
            id: OperationId::next(),
            op,
        }
    }

    /// Create a copy operation.
    pub fn copy(source: OperableItem, destination: OperableItem) -> Self {
        Self::new(FileOperation::Copy {
            source,
            destination,
        })
    }

    /// Create a move operation.
    pub fn move_to(source: OperableItem, destination: OperableItem) -> Self {
        Self::new(FileOperation::Move {
            source,
            destination,
        })
    }

    /// Create a rename operation.
    ///
    /// The new name must be a single non-empty path component.
    pub fn rename(item: OperableItem, new_name: impl Into<String>) -> Result<Self, ItemError> {
        let new_name = new_name.into();
        item.with_name(&new_name)?;
        Ok(Self::new(FileOperation::Rename { item, new_name }))
    }

    /// Create a delete operation.
    pub fn delete(item: OperableItem) -> Self {
        Self::new(FileOperation::Delete { item })
    }

    /// Create a file creation operation.
    pub fn create_file(item: OperableItem) -> Self {
        Self::new(FileOperation::CreateFile { item })
    }

    /// Create a directory creation operation.
    pub fn create_directory(item: OperableItem) -> Self {
        Self::new(FileOperation::CreateDirectory { item })
    }

    /// The identity of this instance.
    pub fn id(&self) -> OperationId {
        self.id
    }

    /// The operation and its arguments.
    pub fn op(&self) -> &FileOperation {
        &self.op
    }

    /// The operation type.
    pub fn kind(&self) -> OperationKind {
        self.op.kind()
    }

    /// Machine-readable operation name.
    pub fn name(&self) -> &'static str {
        self.kind().into()
    }
}

impl PartialEq for Operation {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Operation {}

impl std::hash::Hash for Operation {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.op {
            FileOperation::Copy {
                source,
                destination,
            } => write!(f, "copy {source} -> {destination}"),
            FileOperation::Move {
                source,
                destination,
            } => write!(f, "move {source} -> {destination}"),
            FileOperation::Rename { item, new_name } => write!(f, "rename {item} -> {new_name}"),
            FileOperation::Delete { item } => write!(f, "delete {item}"),
            FileOperation::CreateFile { item } => write!(f, "create file {item}"),
            FileOperation::CreateDirectory { item } => write!(f, "create directory {item}"),
        }
    }
}

/// An operation failed while running.
///
/// `reverted` is true when every change the failed pass made has been
/// undone, so the backend is in the state it was in before the pass.
#[derive(Debug, Clone, Error)]
#[error("Operation failed: {}.", .operation.name())]
pub struct OperationException {
    operation: Operation,
    reverted: bool,
    detail: Option<String>,
}

impl OperationException {
    /// Create an exception for `operation`.
    pub fn new(operation: Operation, reverted: bool) -> Self {
        Self {
            operation,
            reverted,
            detail: None,
        }
    }

    /// Attach extra information.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn with_reverted(mut self, reverted: bool) -> Self {
        self.reverted = reverted;
        self
    }

    /// The operation that failed.
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Whether all changes of the failed pass were undone.
    pub fn reverted(&self) -> bool {
        self.reverted
    }

    /// One-line description of the failure.
    pub fn summary(&self) -> String {
        self.to_string()
    }

    /// Extra information, if the backend gave any.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str) -> OperableItem {
        OperableItem::parse(path, fsmanage_core::ItemKind::File).unwrap()
    }

    #[test]
    fn test_operations_compare_by_identity() {
        let a = Operation::delete(file("a"));
        let b = Operation::delete(file("a"));
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Operation::create_file(file("x")).name(), "create_file");
        assert_eq!(OperationKind::CreateDirectory.to_string(), "create_directory");
        assert_eq!("move".parse::<OperationKind>().unwrap(), OperationKind::Move);
    }

    #[test]
    fn test_rename_rejects_bad_names() {
        assert!(Operation::rename(file("a/b"), "").is_err());
        assert!(Operation::rename(file("a/b"), "c/d").is_err());
        assert!(Operation::rename(file("a/b"), "c").is_ok());
    }

    #[test]
    fn test_exception_summary_and_detail() {
        let op = Operation::copy(file("a"), file("b"));
        let err = OperationException::new(op, true).with_detail("disk full");
        assert_eq!(err.summary(), "Operation failed: copy.");
        assert_eq!(err.detail(), Some("disk full"));
        assert!(err.reverted());
    }
}
