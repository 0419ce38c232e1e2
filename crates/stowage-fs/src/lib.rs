//! Single-file item store backends.
//!
//! Every backend implements [`ItemStore`]: a flat namespace of named byte
//! blobs scoped to one backing location. The persistence layer in the
//! `stowage` crate only ever talks to this trait, so the on-disk directory
//! store and the in-memory store are interchangeable.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod atomic;
pub mod directory;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod store;

pub use directory::DirectoryStore;
pub use error::{Error, Result};
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryStore;
pub use store::{ItemStore, StoreEntry, validate_name};
