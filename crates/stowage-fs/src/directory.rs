//! Directory-backed item store.

use crate::atomic::write_atomic;
use crate::error::{Error, Result};
use crate::store::{ItemStore, StoreEntry, validate_name};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// An [`ItemStore`] where every entry is a file directly inside one directory.
///
/// Writes go through [`write_atomic`], so overwrites are crash-safe and
/// readers never see partially written files.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, or if `root`
    /// exists but is not a directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        if !root.is_dir() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("{} is not a directory", root.display()),
            )));
        }
        debug!(root = %root.display(), "Opened directory store");
        Ok(Self { root })
    }

    /// The directory this store lives in.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }
}

/// Maps `NotFound` IO errors to [`Error::NotFound`] for the given entry.
fn not_found_as(name: &str) -> impl FnOnce(io::Error) -> Error + '_ {
    move |e| {
        if e.kind() == io::ErrorKind::NotFound {
            Error::NotFound(name.to_string())
        } else {
            Error::Io(e)
        }
    }
}

impl ItemStore for DirectoryStore {
    fn exists(&self, name: &str) -> Result<bool> {
        let path = self.path_for(name)?;
        Ok(path.try_exists()?)
    }

    fn create(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(name)?;
        if path.try_exists()? {
            return Err(Error::AlreadyExists(name.to_string()));
        }
        trace!(file = %name, bytes = bytes.len(), "Creating entry");
        write_atomic(&path, bytes)
    }

    fn overwrite(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(name)?;
        if !path.try_exists()? {
            return Err(Error::NotFound(name.to_string()));
        }
        trace!(file = %name, bytes = bytes.len(), "Overwriting entry");
        write_atomic(&path, bytes)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path_for(name)?;
        std::fs::read(&path).map_err(not_found_as(name))
    }

    fn delete(&self, name: &str) -> Result<()> {
        let path = self.path_for(name)?;
        trace!(file = %name, "Deleting entry");
        std::fs::remove_file(&path).map_err(not_found_as(name))
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from_path = self.path_for(from)?;
        let to_path = self.path_for(to)?;
        trace!(from = %from, to = %to, "Renaming entry");
        std::fs::rename(&from_path, &to_path).map_err(not_found_as(from))
    }

    fn list(&self) -> Result<Vec<StoreEntry>> {
        let mut entries = Vec::new();
        for dir_entry in std::fs::read_dir(&self.root)? {
            let dir_entry = dir_entry?;
            let Ok(name) = dir_entry.file_name().into_string() else {
                debug!(
                    entry = ?dir_entry.file_name(),
                    "Skipping entry with non UTF-8 name"
                );
                continue;
            };
            let is_file = dir_entry.file_type()?.is_file();
            entries.push(StoreEntry { name, is_file });
        }
        entries.sort();
        Ok(entries)
    }
}
