//! In-memory map from item id to stored file name.
//!
//! The index is a cache: the store's file names are the durable source of
//! truth and [`ItemIndex::rebuild_from_store`] reconstructs the map from
//! them at startup. After that only the worker mutates it; loads only read.

use crate::item::ItemId;
use crate::naming;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use stowage_fs::ItemStore;
use tracing::{debug, warn};

/// Id → file name map with interior locking for cross-thread reads.
#[derive(Debug, Default)]
pub struct ItemIndex {
    entries: RwLock<BTreeMap<ItemId, String>>,
}

impl ItemIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole map with `entries`.
    ///
    /// On duplicate ids the later entry wins.
    pub fn rebuild<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (ItemId, String)>,
    {
        let mut map = BTreeMap::new();
        for (id, file) in entries {
            if let Some(previous) = map.insert(id, file.clone()) {
                warn!(
                    item_id = id,
                    kept = %file,
                    ignored = %previous,
                    "Multiple stored files claim the same item id"
                );
            }
        }
        *self.write() = map;
    }

    /// Rebuilds the map from the files currently in `store`.
    ///
    /// Entries that are not files or do not match the item file pattern
    /// are ignored. Returns the number of indexed items.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed; the index is left
    /// unchanged in that case.
    pub fn rebuild_from_store(&self, store: &dyn ItemStore) -> stowage_fs::Result<usize> {
        let entries = store.list()?;
        let parsed = entries.into_iter().filter_map(|entry| {
            if !entry.is_file {
                return None;
            }
            match naming::parse_id(&entry.name) {
                Some(id) => {
                    debug!(item_id = id, file = %entry.name, "Found persisted item");
                    Some((id, entry.name))
                }
                None => {
                    debug!(file = %entry.name, "Ignoring non-item file");
                    None
                }
            }
        });
        self.rebuild(parsed);
        Ok(self.len())
    }

    /// Records that `id` is stored in `file`, returning the previous file.
    pub fn put(&self, id: ItemId, file: impl Into<String>) -> Option<String> {
        self.write().insert(id, file.into())
    }

    /// Forgets `id`, returning its file if it was present.
    pub fn remove(&self, id: ItemId) -> Option<String> {
        self.write().remove(&id)
    }

    /// The file `id` is stored in, if known.
    #[must_use]
    pub fn lookup(&self, id: ItemId) -> Option<String> {
        self.read().get(&id).cloned()
    }

    /// Every indexed id, ascending.
    #[must_use]
    pub fn all_ids(&self) -> Vec<ItemId> {
        self.read().keys().copied().collect()
    }

    /// Snapshot of every (id, file) pair, ascending by id.
    #[must_use]
    pub fn entries(&self) -> Vec<(ItemId, String)> {
        self.read()
            .iter()
            .map(|(id, file)| (*id, file.clone()))
            .collect()
    }

    /// Number of indexed items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if no item is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panic cannot leave a BTreeMap half-updated, so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<ItemId, String>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<ItemId, String>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
