//! Item filters, combinable with `|` and `&`.

use std::fmt;
use std::future::Future;
use std::ops::{BitAnd, BitOr};
use std::sync::Arc;

use fsmanage_core::{Item, ItemKind, ItemPath, MetadataValue};
use fsmanage_history::BoxFuture;
use globset::{Glob, GlobMatcher};
use regex::Regex;

use crate::executor::OperationExecutor;

/// Asynchronous item predicate. The executor can be used to query metadata.
pub type PredicateFn =
    Arc<dyn Fn(Item, Arc<OperationExecutor>) -> BoxFuture<'static, bool> + Send + Sync>;

/// Renders a path to a string for matching.
pub type RenderFn = Arc<dyn Fn(&ItemPath) -> String + Send + Sync>;

/// A filter over items.
#[derive(Clone)]
pub enum ItemFilter {
    /// Matches everything.
    Any,
    /// Matches items whose kind is, or is a kind of, this one.
    Kind(ItemKind),
    Predicate(PredicateFn),
    /// Matches if any member matches.
    Or(Vec<ItemFilter>),
    /// Matches if every member matches.
    And(Vec<ItemFilter>),
}

impl ItemFilter {
    /// Build a filter from an async predicate.
    pub fn predicate<F, Fut>(f: F) -> Self
    where
        F: Fn(Item, Arc<OperationExecutor>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Self::Predicate(Arc::new(move |item, executor| Box::pin(f(item, executor))))
    }

    /// Check whether `item` passes the filter.
    ///
    /// Members of `Or` and `And` are checked in order and stop at the first
    /// decisive result.
    pub fn matches<'a>(&'a self, item: &'a Item, executor: &'a Arc<OperationExecutor>) -> BoxFuture<'a, bool> {
        match self {
            Self::Any => Box::pin(async { true }),
            Self::Kind(kind) => {
                let hit = kind.includes(item.kind());
                Box::pin(async move { hit })
            }
            Self::Predicate(predicate) => predicate(item.clone(), Arc::clone(executor)),
            Self::Or(filters) => Box::pin(async move {
                for filter in filters {
                    if filter.matches(item, executor).await {
                        return true;
                    }
                }
                false
            }),
            Self::And(filters) => Box::pin(async move {
                for filter in filters {
                    if !filter.matches(item, executor).await {
                        return false;
                    }
                }
                true
            }),
        }
    }
}

impl Default for ItemFilter {
    fn default() -> Self {
        Self::Any
    }
}

impl From<ItemKind> for ItemFilter {
    fn from(kind: ItemKind) -> Self {
        Self::Kind(kind)
    }
}

impl BitOr for ItemFilter {
    type Output = ItemFilter;

    fn bitor(self, rhs: Self) -> Self {
        match (self, rhs) {
            (Self::Any, _) | (_, Self::Any) => Self::Any,
            (Self::Or(mut left), Self::Or(right)) => {
                left.extend(right);
                Self::Or(left)
            }
            (Self::Or(mut left), right) => {
                left.push(right);
                Self::Or(left)
            }
            (left, Self::Or(mut right)) => {
                right.insert(0, left);
                Self::Or(right)
            }
            (left, right) => Self::Or(vec![left, right]),
        }
    }
}

impl BitAnd for ItemFilter {
    type Output = ItemFilter;

    fn bitand(self, rhs: Self) -> Self {
        match (self, rhs) {
            (Self::Any, other) | (other, Self::Any) => other,
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), right) => {
                left.push(right);
                Self::And(left)
            }
            (left, Self::And(mut right)) => {
                right.insert(0, left);
                Self::And(right)
            }
            (left, right) => Self::And(vec![left, right]),
        }
    }
}

impl fmt::Debug for ItemFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "Any"),
            Self::Kind(kind) => f.debug_tuple("Kind").field(kind).finish(),
            Self::Predicate(_) => write!(f, "Predicate(..)"),
            Self::Or(filters) => f.debug_tuple("Or").field(filters).finish(),
            Self::And(filters) => f.debug_tuple("And").field(filters).finish(),
        }
    }
}

/// Pattern for item names.
#[derive(Debug, Clone)]
pub enum NamePattern {
    Exact(String),
    /// Searched for anywhere in the name.
    Regex(Regex),
    Glob(GlobMatcher),
}

impl NamePattern {
    pub fn exact(name: impl Into<String>) -> Self {
        Self::Exact(name.into())
    }

    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self::Regex)
    }

    pub fn glob(pattern: &str) -> Result<Self, globset::Error> {
        Ok(Self::Glob(Glob::new(pattern)?.compile_matcher()))
    }

    fn is_match(&self, name: &str) -> bool {
        match self {
            Self::Exact(expected) => name == expected,
            Self::Regex(regex) => regex.is_match(name),
            Self::Glob(glob) => glob.is_match(name),
        }
    }
}

/// Pattern for whole item paths.
#[derive(Debug, Clone)]
pub enum PathPattern {
    /// Exact component sequence.
    Components(ItemPath),
    /// Exact rendered string.
    Rendered(String),
    /// Searched for anywhere in the rendered path.
    Regex(Regex),
}

/// Pattern for metadata values.
#[derive(Debug, Clone)]
pub enum ValuePattern {
    Exact(MetadataValue),
    /// Searched for anywhere in the value's text form.
    Regex(Regex),
}

/// Match the name of operable items. The root item never matches.
pub fn match_item_name(pattern: NamePattern) -> ItemFilter {
    ItemFilter::predicate(move |item, _executor| {
        let hit = item.path().name().is_some_and(|name| pattern.is_match(name));
        async move { hit }
    })
}

/// Match item paths, rendering them with `render` for string patterns.
pub fn match_item_path(pattern: PathPattern, render: RenderFn) -> ItemFilter {
    ItemFilter::predicate(move |item, _executor| {
        let hit = match &pattern {
            PathPattern::Components(expected) => item.path() == expected,
            PathPattern::Rendered(expected) => render(item.path()) == *expected,
            PathPattern::Regex(regex) => regex.is_match(&render(item.path())),
        };
        async move { hit }
    })
}

/// Match a metadata property queried through the executor.
///
/// A property the backend does not report is matched as an empty string.
pub fn match_item_metadata(property: impl Into<String>, pattern: ValuePattern) -> ItemFilter {
    let property = property.into();
    let pattern = Arc::new(pattern);
    ItemFilter::predicate(move |item, executor| {
        let property = property.clone();
        let pattern = Arc::clone(&pattern);
        async move {
            let metadata = executor.get_metadata(&item, &[property.as_str()]).await;
            let value = metadata.get(&property);
            match pattern.as_ref() {
                ValuePattern::Exact(expected) => match value {
                    Some(value) => value == expected,
                    None => expected.to_match_text().is_empty(),
                },
                ValuePattern::Regex(regex) => {
                    let text = value.map(MetadataValue::to_match_text).unwrap_or_default();
                    regex.is_match(&text)
                }
            }
        }
    })
}

/// A renderer joining components with `sep` after a `root` prefix.
pub fn render_path(root: &str, sep: &str) -> RenderFn {
    let root = root.to_string();
    let sep = sep.to_string();
    Arc::new(move |path: &ItemPath| path.render(&root, &sep))
}

/// `/a/b` style paths.
pub fn render_path_posix() -> RenderFn {
    render_path("/", "/")
}

/// `a\b` style paths; the first component is the drive.
pub fn render_path_windows() -> RenderFn {
    render_path("", "\\")
}
