//! Which items the worker is allowed to write.
//!
//! Some item kinds are known not to serialize safely. A policy lets the
//! worker drop persist tasks for them silently: no error, no file, no index
//! change. Deletes and renames are never filtered.

use crate::item::Item;
use std::collections::BTreeSet;

/// Predicate deciding whether a persist task may be written.
pub trait PersistPolicy: Send + Sync {
    /// Returns `false` to drop the persist task for `item`.
    fn should_persist(&self, item: &dyn Item) -> bool;
}

impl<F> PersistPolicy for F
where
    F: Fn(&dyn Item) -> bool + Send + Sync,
{
    fn should_persist(&self, item: &dyn Item) -> bool {
        self(item)
    }
}

/// Persists everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersistAll;

impl PersistPolicy for PersistAll {
    fn should_persist(&self, _item: &dyn Item) -> bool {
        true
    }
}

/// Persists everything except the listed kinds.
#[derive(Debug, Clone, Default)]
pub struct SkipKinds {
    kinds: BTreeSet<String>,
}

impl SkipKinds {
    /// Creates a policy skipping `kinds`.
    pub fn new<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kinds: kinds.into_iter().map(Into::into).collect(),
        }
    }
}

impl PersistPolicy for SkipKinds {
    fn should_persist(&self, item: &dyn Item) -> bool {
        !self.kinds.contains(item.kind())
    }
}
