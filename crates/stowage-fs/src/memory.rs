//! In-memory item store for tests.
//!
//! Available under `cfg(test)` or with the `test-util` feature. Entries live
//! in a `BTreeMap` behind a mutex, so `list` is sorted and every operation
//! is trivially atomic.

use crate::error::{Error, Result};
use crate::store::{ItemStore, StoreEntry, validate_name};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
}

/// An [`ItemStore`] that keeps every entry in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with the given files.
    pub fn with_files<I, N, B>(files: I) -> Self
    where
        I: IntoIterator<Item = (N, B)>,
        N: Into<String>,
        B: Into<Vec<u8>>,
    {
        let files = files
            .into_iter()
            .map(|(name, bytes)| (name.into(), bytes.into()))
            .collect();
        Self {
            inner: Mutex::new(Inner {
                files,
                dirs: BTreeSet::new(),
            }),
        }
    }

    /// Adds a directory entry, which `list` reports with `is_file == false`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the lock is poisoned.
    pub fn add_dir(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        self.lock()?.dirs.insert(name.to_string());
        Ok(())
    }

    /// Number of file entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.files.len())
    }

    /// Returns `true` if the store holds no file entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.files.is_empty())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| Error::Internal(format!("mutex poisoned: {e}")))
    }
}

impl ItemStore for MemoryStore {
    fn exists(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        Ok(self.lock()?.files.contains_key(name))
    }

    fn create(&self, name: &str, bytes: &[u8]) -> Result<()> {
        validate_name(name)?;
        let mut inner = self.lock()?;
        if inner.files.contains_key(name) {
            return Err(Error::AlreadyExists(name.to_string()));
        }
        inner.files.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn overwrite(&self, name: &str, bytes: &[u8]) -> Result<()> {
        validate_name(name)?;
        match self.lock()?.files.get_mut(name) {
            Some(contents) => {
                *contents = bytes.to_vec();
                Ok(())
            }
            None => Err(Error::NotFound(name.to_string())),
        }
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        validate_name(name)?;
        self.lock()?
            .files
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    fn delete(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        self.lock()?
            .files
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        validate_name(from)?;
        validate_name(to)?;
        let mut inner = self.lock()?;
        let contents = inner
            .files
            .remove(from)
            .ok_or_else(|| Error::NotFound(from.to_string()))?;
        inner.files.insert(to.to_string(), contents);
        Ok(())
    }

    fn list(&self) -> Result<Vec<StoreEntry>> {
        let inner = self.lock()?;
        let mut entries: Vec<StoreEntry> = inner
            .files
            .keys()
            .map(StoreEntry::file)
            .chain(inner.dirs.iter().map(StoreEntry::dir))
            .collect();
        entries.sort();
        Ok(entries)
    }
}
