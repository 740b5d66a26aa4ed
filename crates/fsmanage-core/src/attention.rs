//! Items needing attention after an operation.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::item::{Item, ItemPath};

/// A group of items a caller should highlight after a change.
///
/// `parent` gives a common location for the items, which is useful when the
/// items themselves might no longer exist (usually the containing directory).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttentionItems {
    parent: Option<Item>,
    items: IndexMap<ItemPath, Item>,
}

impl AttentionItems {
    /// Create attention items with an optional parent.
    pub fn new(parent: Option<Item>, items: impl IntoIterator<Item = Item>) -> Self {
        let mut attention = Self {
            parent,
            items: IndexMap::new(),
        };
        for item in items {
            attention.insert(item);
        }
        attention
    }

    /// Attention items with no parent and no items.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Attention items consisting of a single parent location.
    pub fn parent_only(parent: Item) -> Self {
        Self::new(Some(parent), [])
    }

    /// The common location of the items.
    pub fn parent(&self) -> Option<&Item> {
        self.parent.as_ref()
    }

    /// Iterate over the items (deduplicated by path).
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    /// Check whether an item with `path` is present.
    pub fn contains(&self, path: &ItemPath) -> bool {
        self.items.contains_key(path)
    }

    /// Number of distinct items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if there are no items and no parent.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.parent.is_none()
    }

    /// Combine with `other`.
    ///
    /// Items are unioned by path, with `other`'s value replacing an existing
    /// one. The parent is `other`'s if it has one, otherwise this one's.
    pub fn extended(&self, other: &AttentionItems) -> AttentionItems {
        let mut combined = self.clone();
        combined.extend(other.clone());
        combined
    }

    /// In-place form of [`extended`](Self::extended).
    pub fn extend(&mut self, other: AttentionItems) {
        if other.parent.is_some() {
            self.parent = other.parent;
        }
        for item in other.items.into_values() {
            self.insert(item);
        }
    }

    fn insert(&mut self, item: Item) {
        self.items.insert(item.path().clone(), item);
    }
}

impl FromIterator<Item> for AttentionItems {
    fn from_iter<I: IntoIterator<Item = Item>>(iter: I) -> Self {
        Self::new(None, iter)
    }
}
