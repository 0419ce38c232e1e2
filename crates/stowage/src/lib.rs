//! # Stowage: write-behind item persistence
//!
//! Stowage stores identifiable, named records ("items") as one file each in
//! a backing store. Callers submit persist, update, delete and rename
//! requests from any thread; the requests are queued and applied by a
//! single background worker, so writes to the same item never interleave.
//!
//! ## Design
//!
//! - **Fire and forget** - submissions return `true` once queued; a task that
//!   later fails is logged and counted, never reported back
//! - **Backpressure, not blocking** - a full queue rejects the submission
//! - **The store is the manifest** - stored file names encode the item id, so
//!   the in-memory index is rebuilt from a directory listing at startup
//! - **Explicit type registry** - every loadable kind is registered on a
//!   [`TypeRegistry`] handed to the provider
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use stowage::{Note, PersistenceProvider, ProviderConfig, TypeRegistry};
//!
//! let mut registry = TypeRegistry::new();
//! registry.register_type::<Note>(Note::KIND);
//!
//! let provider = PersistenceProvider::open_dir("items", registry, ProviderConfig::default())?;
//! provider.start()?;
//!
//! // Stored as items/Pin_Map_7.xml
//! provider.persist_item(Arc::new(Note::new(7, "Pin Map", "X")));
//! provider.flush(Duration::from_secs(5));
//!
//! for item in provider.load_items() {
//!     println!("{} {}", item.id(), item.name());
//! }
//! provider.stop();
//! # Ok::<(), stowage::Error>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod index;
pub mod item;
pub mod naming;
pub mod note;
pub mod policy;
pub mod provider;
pub mod queue;
pub mod registry;
pub mod worker;

pub use config::{CONFIG_FILE_NAME, ProviderConfig};
pub use error::{Error, Result};
pub use item::{Item, ItemId, ItemType};
pub use note::Note;
pub use policy::{PersistAll, PersistPolicy, SkipKinds};
pub use provider::PersistenceProvider;
pub use registry::{ItemDocument, TypeRegistry};
pub use worker::WorkerStats;

/// Store backends, re-exported for convenience.
pub use stowage_fs as fs;
