//! In-memory backend implementing every operation kind with undo.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use fsmanage_core::{AttentionItems, Item, ItemKind, ItemPath, Metadata, MetadataValue, OperableItem, props};
use tracing::debug;

use crate::confirm::{ConfirmationKind, Confirmer};
use crate::executor::{OperationExecutor, OperationOutcome, execute_fn, metadata_fn, undo_fn};
use crate::operation::{FileOperation, Operation, OperationException, OperationId, OperationKind};

#[derive(Debug, Clone)]
enum Node {
    Dir { modified: DateTime<Utc> },
    File { contents: Vec<u8>, modified: DateTime<Utc> },
}

impl Node {
    fn kind(&self) -> ItemKind {
        match self {
            Self::Dir { .. } => ItemKind::Dir,
            Self::File { .. } => ItemKind::File,
        }
    }

    fn modified(&self) -> DateTime<Utc> {
        match self {
            Self::Dir { modified } | Self::File { modified, .. } => *modified,
        }
    }

    fn touched(self, now: DateTime<Utc>) -> Self {
        match self {
            Self::Dir { .. } => Self::Dir { modified: now },
            Self::File { contents, .. } => Self::File {
                contents,
                modified: now,
            },
        }
    }
}

/// A node and everything below it, parent first.
type Subtree = Vec<(ItemPath, Node)>;

/// What is needed to revert an applied operation.
#[derive(Debug)]
enum UndoRecord {
    Created {
        path: ItemPath,
    },
    Copied {
        destination: ItemPath,
        replaced: Subtree,
    },
    Moved {
        source: ItemPath,
        destination: ItemPath,
        replaced: Subtree,
    },
    Deleted {
        removed: Subtree,
    },
}

#[derive(Debug, Default)]
struct Tree {
    nodes: BTreeMap<ItemPath, Node>,
    denied: HashSet<ItemPath>,
    undo: HashMap<OperationId, UndoRecord>,
}

impl Tree {
    fn kind_of(&self, path: &ItemPath) -> Option<ItemKind> {
        if path.is_root() {
            return Some(ItemKind::Dir);
        }
        self.nodes.get(path).map(Node::kind)
    }

    fn exists(&self, path: &ItemPath) -> bool {
        self.kind_of(path).is_some()
    }

    fn is_denied(&self, path: &ItemPath) -> bool {
        self.denied.iter().any(|denied| path.starts_with(denied))
    }

    fn subtree(&self, path: &ItemPath) -> Subtree {
        self.nodes
            .range(path.clone()..)
            .take_while(|(candidate, _)| candidate.starts_with(path))
            .map(|(candidate, node)| (candidate.clone(), node.clone()))
            .collect()
    }

    fn remove_subtree(&mut self, path: &ItemPath) -> Subtree {
        let removed = self.subtree(path);
        for (candidate, _) in &removed {
            self.nodes.remove(candidate);
        }
        removed
    }

    fn insert_subtree(&mut self, entries: Subtree) {
        self.nodes.extend(entries);
    }

    fn children(&self, path: &ItemPath) -> Vec<Item> {
        self.nodes
            .range(path.clone()..)
            .take_while(|(candidate, _)| candidate.starts_with(path))
            .filter(|(candidate, _)| candidate.len() == path.len() + 1)
            .map(|(candidate, node)| Item::with_kind(candidate.clone(), node.kind()))
            .collect()
    }

    fn has_children(&self, path: &ItemPath) -> bool {
        self.nodes
            .range(path.clone()..)
            .take_while(|(candidate, _)| candidate.starts_with(path))
            .any(|(candidate, _)| candidate.len() > path.len())
    }

    fn make_dirs(&mut self, path: &ItemPath, now: DateTime<Utc>) {
        let mut current = ItemPath::root();
        for component in path.components() {
            current = current.join(component.clone());
            self.nodes
                .entry(current.clone())
                .or_insert(Node::Dir { modified: now });
        }
    }
}

fn fail(operation: &Operation, detail: impl Into<String>) -> OperationException {
    OperationException::new(operation.clone(), true).with_detail(detail)
}

/// Validate a copy or move against the current tree. Returns whether the
/// destination already exists.
fn check_transfer(
    tree: &Tree,
    operation: &Operation,
    source: &OperableItem,
    destination: &OperableItem,
    remove_source: bool,
) -> Result<bool, OperationException> {
    let (src, dst) = (source.path(), destination.path());
    if !tree.exists(src) {
        return Err(fail(operation, format!("{source} does not exist")));
    }
    if dst.starts_with(src) {
        return Err(fail(
            operation,
            format!("cannot {} {source} into itself", operation.name()),
        ));
    }
    if src.starts_with(dst) {
        return Err(fail(operation, format!("cannot replace {destination}, it contains {source}")));
    }
    if tree.is_denied(dst) || (remove_source && tree.is_denied(src)) {
        return Err(fail(operation, "permission denied"));
    }
    if tree.kind_of(&destination.parent()) != Some(ItemKind::Dir) {
        return Err(fail(
            operation,
            format!("{} is not a directory", destination.parent()),
        ));
    }
    Ok(tree.exists(dst))
}

fn parent_dir(path: &ItemPath) -> Item {
    Item::dir(path.parent().unwrap_or_default())
}

/// A filesystem-like tree held in memory.
///
/// Clones share the same tree. Paths in the seeding helpers are rendered
/// with `/` separators.
#[derive(Clone, Default)]
pub struct MemoryFs {
    tree: Arc<Mutex<Tree>>,
}

impl MemoryFs {
    /// Create an empty tree containing only the root directory.
    pub fn new() -> Self {
        Self::default()
    }

    fn tree(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a directory and any missing parents.
    pub fn create_dir_all(&self, path: &str) {
        self.tree().make_dirs(&ItemPath::parse(path, '/'), Utc::now());
    }

    /// Create or replace a file, creating missing parents.
    pub fn write_file(&self, path: &str, contents: impl Into<Vec<u8>>) {
        let path = ItemPath::parse(path, '/');
        let now = Utc::now();
        let mut tree = self.tree();
        if let Some(parent) = path.parent() {
            tree.make_dirs(&parent, now);
        }
        tree.nodes.insert(
            path,
            Node::File {
                contents: contents.into(),
                modified: now,
            },
        );
    }

    pub fn exists(&self, path: &str) -> bool {
        self.tree().exists(&ItemPath::parse(path, '/'))
    }

    pub fn kind_of(&self, path: &str) -> Option<ItemKind> {
        self.tree().kind_of(&ItemPath::parse(path, '/'))
    }

    /// The item at `path`, tagged with its kind.
    pub fn item(&self, path: &str) -> Option<Item> {
        let path = ItemPath::parse(path, '/');
        let kind = self.tree().kind_of(&path)?;
        Some(Item::with_kind(path, kind))
    }

    pub fn read_file(&self, path: &str) -> Option<Vec<u8>> {
        match self.tree().nodes.get(&ItemPath::parse(path, '/')) {
            Some(Node::File { contents, .. }) => Some(contents.clone()),
            _ => None,
        }
    }

    /// Immediate children of the directory at `path`.
    pub fn list(&self, path: &str) -> Vec<Item> {
        self.tree().children(&ItemPath::parse(path, '/'))
    }

    /// Every path in the tree except the root, sorted.
    pub fn paths(&self) -> Vec<ItemPath> {
        self.tree().nodes.keys().cloned().collect()
    }

    /// Make `path` and everything below it fail to change.
    pub fn deny(&self, path: &str) {
        self.tree().denied.insert(ItemPath::parse(path, '/'));
    }

    /// Undo a previous [`deny`](Self::deny).
    pub fn allow(&self, path: &str) {
        self.tree().denied.remove(&ItemPath::parse(path, '/'));
    }

    /// An executor supporting every operation kind on this tree.
    pub fn executor(&self) -> OperationExecutor {
        let mut executor = OperationExecutor::new().with_metadata({
            let fs = self.clone();
            metadata_fn(move |item, properties| {
                let fs = fs.clone();
                async move { fs.metadata(&item, &properties) }
            })
        });

        for kind in [
            OperationKind::Copy,
            OperationKind::Move,
            OperationKind::Rename,
            OperationKind::Delete,
            OperationKind::CreateFile,
            OperationKind::CreateDirectory,
        ] {
            let execute = {
                let fs = self.clone();
                execute_fn(move |operation, confirmer| fs.clone().execute(operation, confirmer))
            };
            let undo = {
                let fs = self.clone();
                undo_fn(move |operation| {
                    let fs = fs.clone();
                    async move { fs.undo(&operation) }
                })
            };
            executor.support_operation(kind, execute, Some(undo));
        }
        executor
    }

    async fn execute(self, operation: Operation, confirmer: Confirmer) -> OperationOutcome {
        match operation.op().clone() {
            FileOperation::Copy {
                source,
                destination,
            } => {
                self.transfer(&operation, &source, &destination, false, &confirmer)
                    .await
            }
            FileOperation::Move {
                source,
                destination,
            } => {
                self.transfer(&operation, &source, &destination, true, &confirmer)
                    .await
            }
            FileOperation::Rename { item, new_name } => {
                let destination = item
                    .with_name(&new_name)
                    .map_err(|err| fail(&operation, err.to_string()))?;
                self.transfer(&operation, &item, &destination, true, &confirmer)
                    .await
            }
            FileOperation::Delete { item } => self.delete(&operation, &item, &confirmer).await,
            FileOperation::CreateFile { item } => self.create(&operation, &item, ItemKind::File),
            FileOperation::CreateDirectory { item } => self.create(&operation, &item, ItemKind::Dir),
        }
    }

    /// Copy or move `source` to `destination`, asking before replacing an
    /// existing destination.
    async fn transfer(
        &self,
        operation: &Operation,
        source: &OperableItem,
        destination: &OperableItem,
        remove_source: bool,
        confirmer: &Confirmer,
    ) -> OperationOutcome {
        let (src, dst) = (source.path(), destination.path());

        let overwrite = check_transfer(&self.tree(), operation, source, destination, remove_source)?;
        if overwrite {
            let response = confirmer
                .ask(ConfirmationKind::Overwrite, format!("{destination} already exists"))
                .await;
            if !response.is_confirmed() {
                return Err(fail(operation, format!("not replacing {destination}")));
            }
        }

        let mut tree = self.tree();
        // The tree may have changed while the question was open.
        check_transfer(&tree, operation, source, destination, remove_source)?;

        let now = Utc::now();
        let replaced = tree.remove_subtree(dst);
        let entries = if remove_source {
            tree.remove_subtree(src)
        } else {
            tree.subtree(src)
        };
        let kind = entries
            .first()
            .map_or(source.kind(), |(_, node)| node.kind());
        let rebased: Subtree = entries
            .into_iter()
            .filter_map(|(path, node)| {
                let node = if remove_source { node } else { node.touched(now) };
                path.rebase(src, dst).map(|path| (path, node))
            })
            .collect();
        tree.insert_subtree(rebased);

        let record = if remove_source {
            UndoRecord::Moved {
                source: src.clone(),
                destination: dst.clone(),
                replaced,
            }
        } else {
            UndoRecord::Copied {
                destination: dst.clone(),
                replaced,
            }
        };
        tree.undo.insert(operation.id(), record);
        debug!(id = %operation.id(), op = operation.name(), %source, %destination, "applied");

        Ok(AttentionItems::new(
            Some(destination.parent_dir()),
            [Item::with_kind(dst.clone(), kind)],
        ))
    }

    async fn delete(&self, operation: &Operation, item: &OperableItem, confirmer: &Confirmer) -> OperationOutcome {
        let path = item.path();
        let non_empty = {
            let tree = self.tree();
            if !tree.exists(path) {
                return Err(fail(operation, format!("{item} does not exist")));
            }
            if tree.is_denied(path) {
                return Err(fail(operation, "permission denied"));
            }
            tree.has_children(path)
        };

        if non_empty {
            let response = confirmer
                .ask(ConfirmationKind::Delete, format!("{item} is not empty"))
                .await;
            if !response.is_confirmed() {
                return Err(fail(operation, format!("not deleting {item}")));
            }
        }

        let mut tree = self.tree();
        let removed = tree.remove_subtree(path);
        if removed.is_empty() {
            return Err(fail(operation, format!("{item} does not exist")));
        }
        debug!(id = %operation.id(), %item, removed = removed.len(), "deleted");
        tree.undo.insert(operation.id(), UndoRecord::Deleted { removed });

        Ok(AttentionItems::parent_only(item.parent_dir()))
    }

    fn create(&self, operation: &Operation, item: &OperableItem, kind: ItemKind) -> OperationOutcome {
        let path = item.path();
        let mut tree = self.tree();
        if tree.exists(path) {
            return Err(fail(operation, format!("{item} already exists")));
        }
        if tree.is_denied(path) {
            return Err(fail(operation, "permission denied"));
        }
        if tree.kind_of(&item.parent()) != Some(ItemKind::Dir) {
            return Err(fail(operation, format!("{} is not a directory", item.parent())));
        }

        let modified = Utc::now();
        let node = match kind {
            ItemKind::File => Node::File {
                contents: Vec::new(),
                modified,
            },
            _ => Node::Dir { modified },
        };
        tree.nodes.insert(path.clone(), node);
        tree.undo
            .insert(operation.id(), UndoRecord::Created { path: path.clone() });
        debug!(id = %operation.id(), %item, "created");

        Ok(AttentionItems::new(
            Some(item.parent_dir()),
            [Item::with_kind(path.clone(), kind)],
        ))
    }

    fn undo(&self, operation: &Operation) -> OperationOutcome {
        let mut tree = self.tree();
        let Some(record) = tree.undo.remove(&operation.id()) else {
            return Err(fail(operation, "operation has not been applied"));
        };

        let blocked = match &record {
            UndoRecord::Created { path } => tree.is_denied(path),
            UndoRecord::Copied { destination, .. } => tree.is_denied(destination),
            UndoRecord::Moved {
                source,
                destination,
                ..
            } => tree.is_denied(source) || tree.is_denied(destination),
            UndoRecord::Deleted { removed } => removed.first().is_some_and(|(path, _)| tree.is_denied(path)),
        };
        if blocked {
            tree.undo.insert(operation.id(), record);
            return Err(fail(operation, "permission denied"));
        }

        let attention = match record {
            UndoRecord::Created { path } => {
                tree.remove_subtree(&path);
                AttentionItems::parent_only(parent_dir(&path))
            }
            UndoRecord::Copied {
                destination,
                replaced,
            } => {
                tree.remove_subtree(&destination);
                tree.insert_subtree(replaced);
                AttentionItems::parent_only(parent_dir(&destination))
            }
            UndoRecord::Moved {
                source,
                destination,
                replaced,
            } => {
                let entries = tree.remove_subtree(&destination);
                let kind = entries.first().map_or(ItemKind::Item, |(_, node)| node.kind());
                let restored: Subtree = entries
                    .into_iter()
                    .filter_map(|(path, node)| path.rebase(&destination, &source).map(|path| (path, node)))
                    .collect();
                tree.insert_subtree(restored);
                tree.insert_subtree(replaced);
                AttentionItems::new(Some(parent_dir(&source)), [Item::with_kind(source, kind)])
            }
            UndoRecord::Deleted { removed } => {
                let restored = removed
                    .first()
                    .map(|(path, node)| Item::with_kind(path.clone(), node.kind()));
                tree.insert_subtree(removed);
                AttentionItems::new(restored.as_ref().map(|item| parent_dir(item.path())), restored)
            }
        };
        debug!(id = %operation.id(), op = operation.name(), "reverted");
        Ok(attention)
    }

    fn metadata(&self, item: &Item, properties: &[String]) -> Metadata {
        let wants = |name: &str| properties.is_empty() || properties.iter().any(|p| p == name);
        let tree = self.tree();
        let path = item.path();
        let mut values = Metadata::new();
        let Some(kind) = tree.kind_of(path) else {
            return values;
        };

        if wants(props::KIND) {
            values.insert(props::KIND.to_string(), MetadataValue::Kind(kind));
        }
        if kind == ItemKind::Dir && wants(props::ITEMS) {
            values.insert(props::ITEMS.to_string(), MetadataValue::Items(tree.children(path)));
        }
        if let Some(node) = tree.nodes.get(path) {
            if let Node::File { contents, .. } = node {
                if wants(props::SIZE) {
                    values.insert(props::SIZE.to_string(), MetadataValue::Size(contents.len() as u64));
                }
            }
            if wants(props::MODIFIED) {
                values.insert(props::MODIFIED.to_string(), MetadataValue::Time(node.modified()));
            }
        }
        values
    }
}

impl fmt::Debug for MemoryFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tree = self.tree();
        f.debug_struct("MemoryFs")
            .field("nodes", &tree.nodes.len())
            .field("denied", &tree.denied)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_creates_parents() {
        let fs = MemoryFs::new();
        fs.write_file("a/b/c.txt", "hello");

        assert_eq!(fs.kind_of("a"), Some(ItemKind::Dir));
        assert_eq!(fs.kind_of("a/b"), Some(ItemKind::Dir));
        assert_eq!(fs.read_file("a/b/c.txt"), Some(b"hello".to_vec()));
        assert_eq!(fs.kind_of(""), Some(ItemKind::Dir));
    }

    #[test]
    fn test_list_only_immediate_children() {
        let fs = MemoryFs::new();
        fs.write_file("a/x", "");
        fs.write_file("a/sub/y", "");
        fs.write_file("ab", "");

        let names: Vec<_> = fs.list("a").iter().map(|item| item.path().to_string()).collect();
        assert_eq!(names, vec!["/a/sub", "/a/x"]);
    }

    #[test]
    fn test_subtree_does_not_leak_into_siblings() {
        let fs = MemoryFs::new();
        fs.write_file("a/x", "");
        fs.write_file("a0/y", "");

        let tree = fs.tree();
        let subtree = tree.subtree(&ItemPath::parse("a", '/'));
        assert_eq!(subtree.len(), 2);
    }

    #[test]
    fn test_deny_covers_descendants() {
        let fs = MemoryFs::new();
        fs.deny("locked");
        let tree = fs.tree();
        assert!(tree.is_denied(&ItemPath::parse("locked/inner", '/')));
        assert!(!tree.is_denied(&ItemPath::parse("open", '/')));
    }
}
