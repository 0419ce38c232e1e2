//! Atomic single-file writes.
//!
//! Contents are written to a sibling temporary file which is flushed,
//! synced and then renamed over the target. On POSIX systems a rename within
//! one filesystem is atomic, so a reader sees either the previous contents
//! or the new ones.
//!
//! If the process dies mid-write the target is untouched; the temporary file
//! may be left behind. Its `.tmp` suffix keeps it out of the item name
//! pattern, so it is never mistaken for a stored item.

use crate::error::Result;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Atomically replaces (or creates) `path` with `bytes`.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be created or written, or
/// if the final rename fails (e.g. a cross-filesystem move). On failure the
/// temporary file is removed on a best-effort basis and the target is left
/// unchanged.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp_path = make_temp_path(path);

    if let Err(e) = write_to_temp_file(&temp_path, bytes) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }

    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e.into());
    }

    Ok(())
}

/// Builds the temporary path used while writing `path`.
///
/// `.tmp` is appended to the full file name, so `a.xml` becomes
/// `a.xml.tmp` and `a` becomes `a.tmp`.
pub(crate) fn make_temp_path(path: &Path) -> PathBuf {
    let mut temp_path = path.to_path_buf();
    let new_extension = match path.extension() {
        Some(ext) => {
            let mut new_ext = ext.to_os_string();
            new_ext.push(".tmp");
            new_ext
        }
        None => std::ffi::OsString::from("tmp"),
    };
    temp_path.set_extension(new_extension);
    temp_path
}

fn write_to_temp_file(temp_path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(temp_path)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn make_temp_path_with_extension() {
        let temp = make_temp_path(Path::new("/store/Pin_Map_7.xml"));
        assert_eq!(temp, Path::new("/store/Pin_Map_7.xml.tmp"));
    }

    #[test]
    fn make_temp_path_without_extension() {
        let temp = make_temp_path(Path::new("/store/notes"));
        assert_eq!(temp, Path::new("/store/notes.tmp"));
    }

    #[test]
    fn make_temp_path_with_multiple_extensions() {
        let temp = make_temp_path(Path::new("file.tar.gz"));
        assert_eq!(temp, Path::new("file.tar.gz.tmp"));
    }

    #[test]
    fn write_atomic_creates_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a.xml");

        write_atomic(&target, b"first").unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"first");
        assert!(!make_temp_path(&target).exists());
    }

    #[test]
    fn write_atomic_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a.xml");
        std::fs::write(&target, "old content that is longer").unwrap();

        write_atomic(&target, b"new").unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"new");
    }

    #[test]
    fn write_atomic_fails_for_missing_parent() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("missing").join("a.xml");

        assert!(write_atomic(&target, b"x").is_err());
        assert!(!target.exists());
    }
}
