//! The store backend contract.
//!
//! An [`ItemStore`] is a flat collection of named byte blobs ("entries")
//! living in one backing location, typically a directory. Entry names are
//! plain file names: no separators, no `.`/`..`, never empty.
//!
//! # Atomicity
//!
//! Implementations must make `create`, `overwrite` and `put` atomic per
//! entry: a concurrent `read` observes either the old or the new contents,
//! never a torn write. No ordering or atomicity is promised across entries.

use crate::error::{Error, Result};

/// One entry returned by [`ItemStore::list`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct StoreEntry {
    /// Entry name, relative to the store root.
    pub name: String,
    /// `false` for subdirectories and other non-file entries.
    pub is_file: bool,
}

impl StoreEntry {
    /// Creates a file entry.
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_file: true,
        }
    }

    /// Creates a non-file (directory) entry.
    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_file: false,
        }
    }
}

/// Storage for individually named entries.
///
/// Implementations must be `Send + Sync`: the persistence worker mutates the
/// store from its own thread while callers read from theirs.
///
/// # Errors
///
/// All methods return [`Error::InvalidName`] for names rejected by
/// [`validate_name`], and [`Error::Io`] / [`Error::Internal`] for backend
/// failures.
pub trait ItemStore: Send + Sync {
    /// Returns whether an entry with this name exists.
    fn exists(&self, name: &str) -> Result<bool>;

    /// Creates a new entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] if the entry is already present.
    fn create(&self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Replaces the contents of an existing entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the entry does not exist.
    fn overwrite(&self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Reads the full contents of an entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the entry does not exist.
    fn read(&self, name: &str) -> Result<Vec<u8>>;

    /// Removes an entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the entry does not exist.
    fn delete(&self, name: &str) -> Result<()>;

    /// Moves an entry to a new name, replacing any entry already there.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `from` does not exist.
    fn rename(&self, from: &str, to: &str) -> Result<()>;

    /// Lists every entry in the store, files and non-files alike.
    fn list(&self) -> Result<Vec<StoreEntry>>;

    /// Creates the entry if absent, otherwise overwrites it.
    fn put(&self, name: &str, bytes: &[u8]) -> Result<()> {
        if self.exists(name)? {
            self.overwrite(name, bytes)
        } else {
            self.create(name, bytes)
        }
    }
}

/// Checks that `name` is a single plain file name.
///
/// # Errors
///
/// Returns [`Error::InvalidName`] if the name is empty, is `.` or `..`, or
/// contains a path separator or NUL byte.
pub fn validate_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if bad {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}
