//! Item and path value types.

use std::fmt;
use std::hash::{Hash, Hasher};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::error::ItemError;

/// Ordered sequence of path components.
///
/// The empty path is the top-level location of a filesystem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemPath(Vec<CompactString>);

impl ItemPath {
    /// Create a path from components.
    pub fn new<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        Self(components.into_iter().map(Into::into).collect())
    }

    /// The empty path.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Split a rendered path on `sep`, dropping empty components.
    pub fn parse(rendered: &str, sep: char) -> Self {
        Self(
            rendered
                .split(sep)
                .filter(|c| !c.is_empty())
                .map(CompactString::from)
                .collect(),
        )
    }

    /// Get the path components.
    pub fn components(&self) -> &[CompactString] {
        &self.0
    }

    /// Check if this is the empty path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the path has no components.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The last component, if any.
    pub fn name(&self) -> Option<&str> {
        self.0.last().map(CompactString::as_str)
    }

    /// The path minus its last component, or `None` for the empty path.
    pub fn parent(&self) -> Option<ItemPath> {
        self.0.split_last().map(|(_, rest)| Self(rest.to_vec()))
    }

    /// Append a component.
    pub fn join(&self, component: impl Into<CompactString>) -> ItemPath {
        let mut components = self.0.clone();
        components.push(component.into());
        Self(components)
    }

    /// Check if `prefix` is an ancestor of (or equal to) this path.
    pub fn starts_with(&self, prefix: &ItemPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Replace the leading `from` components with `to`.
    ///
    /// Returns `None` if this path is not inside `from`.
    pub fn rebase(&self, from: &ItemPath, to: &ItemPath) -> Option<ItemPath> {
        let rest = self.0.strip_prefix(from.0.as_slice())?;
        let mut components = to.0.clone();
        components.extend(rest.iter().cloned());
        Some(Self(components))
    }

    /// Render the components joined by `sep`, with `root` prepended.
    pub fn render(&self, root: &str, sep: &str) -> String {
        let mut out = String::from(root);
        for (i, component) in self.0.iter().enumerate() {
            if i > 0 {
                out.push_str(sep);
            }
            out.push_str(component);
        }
        out
    }
}

impl fmt::Display for ItemPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render("/", "/"))
    }
}

impl<S: Into<CompactString>> FromIterator<S> for ItemPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Type tag for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Something found in the tree whose type is unknown or irrelevant.
    #[default]
    Item,
    /// An item that contains other items.
    Dir,
    /// An item that contains binary data.
    File,
}

impl ItemKind {
    /// Whether an item tagged `other` is also an item of this kind.
    ///
    /// Every tagged item is an [`ItemKind::Item`].
    pub fn includes(&self, other: ItemKind) -> bool {
        *self == ItemKind::Item || *self == other
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Item => write!(f, "item"),
            Self::Dir => write!(f, "directory"),
            Self::File => write!(f, "file"),
        }
    }
}

/// Representation of something found in a filesystem tree.
///
/// Items are compared and hashed by path only; the kind is a hint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    path: ItemPath,
    #[serde(default)]
    kind: ItemKind,
}

impl Item {
    /// Create an untyped item.
    pub fn new(path: ItemPath) -> Self {
        Self::with_kind(path, ItemKind::Item)
    }

    /// Create an item with an explicit kind.
    pub fn with_kind(path: ItemPath, kind: ItemKind) -> Self {
        Self { path, kind }
    }

    /// Create a directory item.
    pub fn dir(path: ItemPath) -> Self {
        Self::with_kind(path, ItemKind::Dir)
    }

    /// Create a file item.
    pub fn file(path: ItemPath) -> Self {
        Self::with_kind(path, ItemKind::File)
    }

    /// The top-level directory (empty path).
    pub fn root() -> Self {
        Self::dir(ItemPath::root())
    }

    /// Get the item path.
    pub fn path(&self) -> &ItemPath {
        &self.path
    }

    /// Get the item kind.
    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == ItemKind::Dir
    }

    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        self.kind == ItemKind::File
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for Item {}

impl Hash for Item {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.path.fmt(f)
    }
}

/// An item that operations can change; its path is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Item", into = "Item")]
pub struct OperableItem(Item);

impl OperableItem {
    /// Create an operable item of the given kind.
    pub fn new(path: ItemPath, kind: ItemKind) -> Result<Self, ItemError> {
        if path.is_empty() {
            return Err(ItemError::EmptyPath { kind });
        }
        Ok(Self(Item::with_kind(path, kind)))
    }

    /// Create an operable file.
    pub fn file(path: ItemPath) -> Result<Self, ItemError> {
        Self::new(path, ItemKind::File)
    }

    /// Create an operable directory.
    pub fn dir(path: ItemPath) -> Result<Self, ItemError> {
        Self::new(path, ItemKind::Dir)
    }

    /// Create an operable item from a rendered `/`-separated path.
    pub fn parse(rendered: &str, kind: ItemKind) -> Result<Self, ItemError> {
        Self::new(ItemPath::parse(rendered, '/'), kind)
    }

    /// The last component of the path.
    pub fn name(&self) -> &str {
        self.0.path.name().unwrap_or_default()
    }

    /// The path of the containing directory.
    pub fn parent(&self) -> ItemPath {
        self.0.path.parent().unwrap_or_default()
    }

    /// The containing directory as an item.
    pub fn parent_dir(&self) -> Item {
        Item::dir(self.parent())
    }

    /// Get the item path.
    pub fn path(&self) -> &ItemPath {
        self.0.path()
    }

    /// Get the item kind.
    pub fn kind(&self) -> ItemKind {
        self.0.kind()
    }

    /// Borrow as a plain item.
    pub fn as_item(&self) -> &Item {
        &self.0
    }

    /// Same location and kind, with the last component replaced.
    pub fn with_name(&self, name: &str) -> Result<Self, ItemError> {
        if name.is_empty() || name.contains('/') {
            return Err(ItemError::InvalidComponent {
                component: name.to_string(),
            });
        }
        Self::new(self.parent().join(name), self.kind())
    }
}

impl TryFrom<Item> for OperableItem {
    type Error = ItemError;

    fn try_from(item: Item) -> Result<Self, Self::Error> {
        Self::new(item.path, item.kind)
    }
}

impl From<OperableItem> for Item {
    fn from(item: OperableItem) -> Self {
        item.0
    }
}

impl AsRef<Item> for OperableItem {
    fn as_ref(&self) -> &Item {
        &self.0
    }
}

impl fmt::Display for OperableItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_parse_and_render() {
        let path = ItemPath::parse("/home//user/docs/", '/');
        assert_eq!(path.components().len(), 3);
        assert_eq!(path.render("", "\\"), "home\\user\\docs");
        assert_eq!(path.to_string(), "/home/user/docs");
    }

    #[test]
    fn test_path_rebase() {
        let path = ItemPath::new(["a", "b", "c"]);
        let rebased = path
            .rebase(&ItemPath::new(["a"]), &ItemPath::new(["x", "y"]))
            .unwrap();
        assert_eq!(rebased, ItemPath::new(["x", "y", "b", "c"]));
        assert!(path.rebase(&ItemPath::new(["b"]), &ItemPath::root()).is_none());
    }

    #[test]
    fn test_item_equality_ignores_kind() {
        let path = ItemPath::new(["a", "b"]);
        assert_eq!(Item::dir(path.clone()), Item::file(path));
    }

    #[test]
    fn test_kind_includes() {
        assert!(ItemKind::Item.includes(ItemKind::Dir));
        assert!(ItemKind::Dir.includes(ItemKind::Dir));
        assert!(!ItemKind::Dir.includes(ItemKind::File));
    }

    #[test]
    fn test_with_name_rejects_separator() {
        let item = OperableItem::file(ItemPath::new(["a", "b.txt"])).unwrap();
        assert!(item.with_name("c/d").is_err());
        assert_eq!(
            item.with_name("c.txt").unwrap().path(),
            &ItemPath::new(["a", "c.txt"])
        );
    }
}
