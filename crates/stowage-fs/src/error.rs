//! Error types for store backend operations.

use std::io;
use thiserror::Error;

/// The error type for store backend operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error occurred while touching the backing location.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The entry name is not a single, plain file name.
    #[error("Invalid entry name: {0:?}")]
    InvalidName(String),

    /// The named entry does not exist.
    #[error("Entry not found: {0}")]
    NotFound(String),

    /// `create` was called for an entry that already exists.
    #[error("Entry already exists: {0}")]
    AlreadyExists(String),

    /// Internal invariant violated (e.g. a poisoned lock).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for store backend operations.
pub type Result<T> = std::result::Result<T, Error>;
