//! Core types for fsmanage.
//!
//! This crate provides the plain value objects shared by the history and
//! operation engines: item paths, items, operable items, attention items and
//! metadata values. Everything here is immutable once constructed and cheap
//! to clone.

mod attention;
mod error;
mod item;
mod metadata;

pub use attention::AttentionItems;
pub use error::ItemError;
pub use item::{Item, ItemKind, ItemPath, OperableItem};
pub use metadata::{Metadata, MetadataValue, props};
