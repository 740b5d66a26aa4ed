//! Error types for item construction.

use thiserror::Error;

use crate::item::ItemKind;

/// Errors raised when building item values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    /// An operable item was given an empty path.
    #[error("Operable {kind} requires a non-empty path")]
    EmptyPath { kind: ItemKind },

    /// A path component was empty or contained a separator.
    #[error("Invalid path component: {component:?}")]
    InvalidComponent { component: String },
}
