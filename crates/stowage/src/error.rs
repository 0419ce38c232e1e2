//! Error types for stowage operations.
//!
//! Most of these never reach callers of the provider's submission and
//! retrieval operations: the worker logs and drops failed tasks, and loads
//! report "not found". They surface on configuration, store-opening and
//! startup paths, and inside the crate where failures are classified.

use std::io;
use thiserror::Error;

/// The error type for stowage operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Store backend failure.
    #[error("Store error: {0}")]
    Store(#[from] stowage_fs::Error),

    /// Item document (de)serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored document names a kind that was never registered.
    #[error("Unknown item kind: {0}")]
    UnknownKind(String),

    /// A decoder produced an item whose kind differs from the document's.
    #[error("Item kind mismatch: document says {expected}, decoded {actual}")]
    KindMismatch {
        /// Kind recorded in the document.
        expected: String,
        /// Kind reported by the decoded item.
        actual: String,
    },

    /// The stored payload does not match its recorded checksum.
    #[error("Checksum mismatch for item {id}")]
    ChecksumMismatch {
        /// Id recorded in the document.
        id: u64,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error outside the store backend (config files, thread spawning).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A specialized Result type for stowage operations.
pub type Result<T> = std::result::Result<T, Error>;
