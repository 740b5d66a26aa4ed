//! Metadata values returned by backend queries.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::item::{Item, ItemKind};

/// Property names every backend is expected to understand.
pub mod props {
    /// Immediate children of a directory, as items.
    pub const ITEMS: &str = "items";
    /// Item kind.
    pub const KIND: &str = "kind";
    /// Size in bytes.
    pub const SIZE: &str = "size";
    /// Last modification time.
    pub const MODIFIED: &str = "modified";
}

/// A single metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MetadataValue {
    Items(Vec<Item>),
    Kind(ItemKind),
    Size(u64),
    Time(DateTime<Utc>),
    Text(String),
    Int(i64),
    Bool(bool),
}

impl MetadataValue {
    /// Render the value as text for pattern matching.
    pub fn to_match_text(&self) -> String {
        match self {
            Self::Items(items) => items
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Kind(kind) => kind.to_string(),
            Self::Size(size) => size.to_string(),
            Self::Time(time) => time.to_rfc3339(),
            Self::Text(text) => text.clone(),
            Self::Int(value) => value.to_string(),
            Self::Bool(value) => value.to_string(),
        }
    }

    /// Get the children if this is an `items` value.
    pub fn as_items(&self) -> Option<&[Item]> {
        match self {
            Self::Items(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Property name to value, in the order the backend produced them.
pub type Metadata = IndexMap<String, MetadataValue>;
