//! Centralized error types for mailnorm.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailnorm library.
#[derive(Error, Debug)]
pub enum NormalizeError {
    /// An argument was empty or absent where a value is required.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The conversation index is too short to carry an embedded GUID.
    #[error("Malformed conversation index: {len} byte(s), at least 22 required")]
    MalformedConversationIndex { len: usize },

    /// The required field batch could not be fetched from the store.
    #[error("Failed to fetch item '{item}': {reason}")]
    StoreFetch { item: String, reason: String },

    /// A delete, move or reply operation was rejected by the store.
    #[error("Store operation '{op}' failed for item '{item}': {reason}")]
    StoreOperation {
        op: &'static str,
        item: String,
        reason: String,
    },

    /// The store has no item with the given id.
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// A hex string could not be decoded.
    #[error("Invalid hex string: {0}")]
    InvalidHex(String),

    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias for `Result<T, NormalizeError>`.
pub type Result<T> = std::result::Result<T, NormalizeError>;

impl NormalizeError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `StoreFetch` variant for an item.
    pub fn fetch(item: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        Self::StoreFetch {
            item: item.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a `StoreOperation` variant for an item.
    pub fn operation(
        op: &'static str,
        item: impl std::fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        Self::StoreOperation {
            op,
            item: item.to_string(),
            reason: reason.into(),
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare, prefer `NormalizeError::io`).
impl From<std::io::Error> for NormalizeError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
