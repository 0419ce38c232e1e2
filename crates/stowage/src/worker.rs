//! The background persistence worker.
//!
//! Exactly one worker thread applies every store mutation. It drains the
//! [`TaskQueue`] for as long as its run flag is set, waking up at least once
//! per dequeue timeout to re-check the flag.
//!
//! ```text
//! ┌──────────────────────────────┬──────────────────────────────────────┐
//! │ Caller threads               │ Worker thread ("stowage-worker")     │
//! │ ──────────────               │ ────────────────────────────────     │
//! │ persist/update/delete/rename │ dequeue_timeout()                    │
//! │   validate                   │ run flag cleared? abandon, exit      │
//! │   try_enqueue ───────────────┼→ process task (panics caught)        │
//! │   return bool                │   write/delete/move file, update     │
//! │                              │   index, count, log failures         │
//! │ load_item (reads only)       │ complete()                           │
//! └──────────────────────────────┴──────────────────────────────────────┘
//! ```
//!
//! A failed task is logged at error level with the item id, kind and file,
//! counted in [`WorkerStats::failed`], and dropped. It is never retried.

use crate::error::Result;
use crate::index::ItemIndex;
use crate::item::Item;
use crate::naming;
use crate::policy::PersistPolicy;
use crate::queue::{Operation, QueuedTask, TaskQueue};
use crate::registry::TypeRegistry;
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use stowage_fs::ItemStore;
use tracing::{debug, error, info, trace, warn};

/// Name given to the worker thread.
pub const WORKER_THREAD_NAME: &str = "stowage-worker";

/// Snapshot of the worker's counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    /// Persist tasks that wrote a file.
    pub persisted: u64,
    /// Delete tasks processed (including deletes of absent items).
    pub deleted: u64,
    /// Rename tasks that moved a file.
    pub renamed: u64,
    /// Persist tasks dropped by the persist policy.
    pub skipped: u64,
    /// Tasks that failed and were dropped.
    pub failed: u64,
    /// Tasks dequeued after a stop request, or discarded by `stop()`.
    pub abandoned: u64,
}

/// Live counters shared between the worker and the provider.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    persisted: AtomicU64,
    deleted: AtomicU64,
    renamed: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    abandoned: AtomicU64,
}

impl Counters {
    pub(crate) fn snapshot(&self) -> WorkerStats {
        WorkerStats {
            persisted: self.persisted.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            renamed: self.renamed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn add_abandoned(&self, n: usize) {
        let n = u64::try_from(n).unwrap_or(u64::MAX);
        self.abandoned.fetch_add(n, Ordering::Relaxed);
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Everything the worker touches, shared with the provider.
pub(crate) struct Shared {
    pub(crate) store: Arc<dyn ItemStore>,
    pub(crate) registry: RwLock<TypeRegistry>,
    pub(crate) index: ItemIndex,
    pub(crate) queue: TaskQueue,
    pub(crate) policy: Box<dyn PersistPolicy>,
    pub(crate) counters: Counters,
}

impl Shared {
    pub(crate) fn registry(&self) -> std::sync::RwLockReadGuard<'_, TypeRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Outcome of one successfully processed task.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    Persisted { file: String },
    Skipped,
    Deleted { existed: bool },
    Renamed { from: String, to: String },
    NothingToRename,
}

/// The worker loop and per-task processing.
pub(crate) struct Worker {
    shared: Arc<Shared>,
    running: Arc<AtomicBool>,
    dequeue_timeout: Duration,
}

impl Worker {
    pub(crate) fn new(
        shared: Arc<Shared>,
        running: Arc<AtomicBool>,
        dequeue_timeout: Duration,
    ) -> Self {
        Self {
            shared,
            running,
            dequeue_timeout,
        }
    }

    /// Starts the loop on a dedicated named thread.
    pub(crate) fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || self.run())
    }

    /// Drains the queue until the run flag is cleared.
    pub(crate) fn run(&self) {
        info!("Persistence worker started");
        while self.running.load(Ordering::Acquire) {
            let Some(task) = self.shared.queue.dequeue_timeout(self.dequeue_timeout) else {
                continue;
            };
            if !self.running.load(Ordering::Acquire) {
                warn!(
                    item_id = task.item.id(),
                    op = %task.op,
                    "Stop requested; abandoning dequeued task"
                );
                self.shared.counters.add_abandoned(1);
                self.shared.queue.complete();
                break;
            }
            self.process_isolated(&task);
            self.shared.queue.complete();
        }
        let stats = self.shared.counters.snapshot();
        info!(
            persisted = stats.persisted,
            deleted = stats.deleted,
            renamed = stats.renamed,
            skipped = stats.skipped,
            failed = stats.failed,
            "Persistence worker stopped"
        );
    }

    /// Processes one task; neither an error nor a panic escapes.
    fn process_isolated(&self, task: &QueuedTask) {
        let item = task.item.as_ref();
        match panic::catch_unwind(AssertUnwindSafe(|| self.process(task))) {
            Ok(Ok(outcome)) => self.record(item, &outcome),
            Ok(Err(e)) => {
                Counters::bump(&self.shared.counters.failed);
                error!(
                    item_id = item.id(),
                    kind = item.kind(),
                    op = %task.op,
                    file = %naming::file_name_for(item),
                    error = %e,
                    "Persistence task failed; dropping it"
                );
            }
            Err(payload) => {
                Counters::bump(&self.shared.counters.failed);
                error!(
                    item_id = item.id(),
                    kind = item.kind(),
                    op = %task.op,
                    panic_msg = %panic_message(payload.as_ref()),
                    "Persistence task panicked; dropping it"
                );
            }
        }
    }

    fn record(&self, item: &dyn Item, outcome: &Outcome) {
        let counters = &self.shared.counters;
        match outcome {
            Outcome::Persisted { file } => {
                Counters::bump(&counters.persisted);
                debug!(item_id = item.id(), file = %file, "Persisted item");
            }
            Outcome::Skipped => {
                Counters::bump(&counters.skipped);
                trace!(item_id = item.id(), kind = item.kind(), "Skipped non-persistable item");
            }
            Outcome::Deleted { existed } => {
                Counters::bump(&counters.deleted);
                debug!(item_id = item.id(), existed, "Deleted item");
            }
            Outcome::Renamed { from, to } => {
                Counters::bump(&counters.renamed);
                debug!(item_id = item.id(), from = %from, to = %to, "Renamed item file");
            }
            Outcome::NothingToRename => {
                debug!(item_id = item.id(), "No stored file to rename");
            }
        }
    }

    fn process(&self, task: &QueuedTask) -> Result<Outcome> {
        let item = task.item.as_ref();
        match &task.op {
            Operation::Persist => self.persist(item),
            Operation::Delete => self.delete(item),
            Operation::Rename { new_name } => self.rename(item, new_name),
        }
    }

    fn persist(&self, item: &dyn Item) -> Result<Outcome> {
        if !self.shared.policy.should_persist(item) {
            return Ok(Outcome::Skipped);
        }
        let file = naming::file_name_for(item);
        let bytes = self.shared.registry().encode(item)?;
        self.shared.store.put(&file, &bytes)?;

        // A different previous file means the item was renamed since it was
        // last written; that file would otherwise resurface on restart.
        if let Some(stale) = self.shared.index.put(item.id(), file.clone())
            && stale != file
        {
            if let Err(e) = self.remove_if_present(&stale) {
                warn!(
                    item_id = item.id(),
                    file = %stale,
                    error = %e,
                    "Failed to remove file left over from previous name"
                );
            }
        }
        Ok(Outcome::Persisted { file })
    }

    fn delete(&self, item: &dyn Item) -> Result<Outcome> {
        let file = self
            .shared
            .index
            .lookup(item.id())
            .unwrap_or_else(|| naming::file_name_for(item));
        let existed = self.remove_if_present(&file)?;
        self.shared.index.remove(item.id());
        Ok(Outcome::Deleted { existed })
    }

    fn rename(&self, item: &dyn Item, new_name: &str) -> Result<Outcome> {
        let Some(current) = self.shared.index.lookup(item.id()) else {
            return Ok(Outcome::NothingToRename);
        };
        let target = naming::file_name(new_name, item.id());
        if current == target {
            return Ok(Outcome::NothingToRename);
        }
        if !self.shared.store.exists(&current)? {
            warn!(
                item_id = item.id(),
                file = %current,
                "Indexed file vanished from the store; forgetting it"
            );
            self.shared.index.remove(item.id());
            return Ok(Outcome::NothingToRename);
        }
        self.shared.store.rename(&current, &target)?;
        self.shared.index.put(item.id(), target.clone());
        Ok(Outcome::Renamed {
            from: current,
            to: target,
        })
    }

    fn remove_if_present(&self, file: &str) -> Result<bool> {
        if self.shared.store.exists(file)? {
            self.shared.store.delete(file)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{ItemId, ItemType};
    use crate::policy::{PersistAll, SkipKinds};
    use serde::{Deserialize, Serialize};
    use stowage_fs::MemoryStore;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: ItemId,
        name: String,
    }

    impl Item for Note {
        fn id(&self) -> ItemId {
            self.id
        }
        fn name(&self) -> &str {
            &self.name
        }
        fn kind(&self) -> &str {
            "note"
        }
        fn to_payload(&self) -> serde_json::Result<serde_json::Value> {
            serde_json::to_value(self)
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    impl ItemType for Note {
        fn from_payload(payload: serde_json::Value) -> serde_json::Result<Self> {
            serde_json::from_value(payload)
        }
    }

    #[derive(Debug)]
    struct Exploding;

    impl Item for Exploding {
        fn id(&self) -> ItemId {
            13
        }
        fn name(&self) -> &str {
            "boom"
        }
        fn kind(&self) -> &str {
            "note"
        }
        fn to_payload(&self) -> serde_json::Result<serde_json::Value> {
            panic!("payload exploded")
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn note(id: ItemId, name: &str) -> Arc<dyn Item> {
        Arc::new(Note {
            id,
            name: name.to_string(),
        })
    }

    fn worker_with(policy: Box<dyn PersistPolicy>) -> (Worker, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let mut registry = TypeRegistry::new();
        registry.register_type::<Note>("note");
        let shared = Arc::new(Shared {
            store: Arc::clone(&store) as Arc<dyn ItemStore>,
            registry: RwLock::new(registry),
            index: ItemIndex::new(),
            queue: TaskQueue::new(8),
            policy,
            counters: Counters::default(),
        });
        let worker = Worker::new(
            shared,
            Arc::new(AtomicBool::new(true)),
            Duration::from_millis(10),
        );
        (worker, store)
    }

    fn worker() -> (Worker, Arc<MemoryStore>) {
        worker_with(Box::new(PersistAll))
    }

    fn apply(worker: &Worker, item: Arc<dyn Item>, op: Operation) {
        worker.process_isolated(&QueuedTask::new(item, op));
    }

    #[test]
    fn persist_writes_file_and_indexes_it() {
        let (worker, store) = worker();

        apply(&worker, note(7, "Pin Map"), Operation::Persist);

        assert!(store.exists("Pin_Map_7.xml").unwrap());
        assert_eq!(worker.shared.index.lookup(7).as_deref(), Some("Pin_Map_7.xml"));
        assert_eq!(worker.shared.counters.snapshot().persisted, 1);
    }

    #[test]
    fn persist_after_name_change_removes_stale_file() {
        let (worker, store) = worker();

        apply(&worker, note(7, "Pin Map"), Operation::Persist);
        apply(&worker, note(7, "Route Map"), Operation::Persist);

        assert!(!store.exists("Pin_Map_7.xml").unwrap());
        assert!(store.exists("Route_Map_7.xml").unwrap());
        assert_eq!(worker.shared.index.lookup(7).as_deref(), Some("Route_Map_7.xml"));
    }

    #[test]
    fn policy_skip_leaves_no_trace() {
        let (worker, store) = worker_with(Box::new(SkipKinds::new(["note"])));

        apply(&worker, note(7, "Pin Map"), Operation::Persist);

        assert!(store.is_empty().unwrap());
        assert!(worker.shared.index.is_empty());
        let stats = worker.shared.counters.snapshot();
        assert_eq!((stats.skipped, stats.failed), (1, 0));
    }

    #[test]
    fn delete_is_idempotent() {
        let (worker, store) = worker();
        apply(&worker, note(7, "Pin Map"), Operation::Persist);

        apply(&worker, note(7, "Pin Map"), Operation::Delete);
        apply(&worker, note(7, "Pin Map"), Operation::Delete);

        assert!(store.is_empty().unwrap());
        assert!(worker.shared.index.is_empty());
        let stats = worker.shared.counters.snapshot();
        assert_eq!((stats.deleted, stats.failed), (2, 0));
    }

    #[test]
    fn delete_without_index_entry_uses_canonical_name() {
        let (worker, store) = worker();
        store.create("Pin_Map_7.xml", b"{}").unwrap();

        apply(&worker, note(7, "Pin Map"), Operation::Delete);

        assert!(!store.exists("Pin_Map_7.xml").unwrap());
    }

    #[test]
    fn rename_moves_file_and_updates_index() {
        let (worker, store) = worker();
        apply(&worker, note(7, "Pin Map"), Operation::Persist);

        apply(
            &worker,
            note(7, "Pin Map"),
            Operation::Rename {
                new_name: "Route Map".to_string(),
            },
        );

        assert!(!store.exists("Pin_Map_7.xml").unwrap());
        assert!(store.exists("Route_Map_7.xml").unwrap());
        assert_eq!(worker.shared.index.lookup(7).as_deref(), Some("Route_Map_7.xml"));
        assert_eq!(worker.shared.counters.snapshot().renamed, 1);
    }

    #[test]
    fn rename_of_unstored_item_does_nothing() {
        let (worker, store) = worker();

        apply(
            &worker,
            note(7, "Pin Map"),
            Operation::Rename {
                new_name: "Route Map".to_string(),
            },
        );

        assert!(store.is_empty().unwrap());
        let stats = worker.shared.counters.snapshot();
        assert_eq!((stats.renamed, stats.failed), (0, 0));
    }

    #[test]
    fn unregistered_kind_fails_without_indexing() {
        let (worker, store) = worker();
        *worker.shared.registry.write().unwrap() = TypeRegistry::new();

        apply(&worker, note(7, "Pin Map"), Operation::Persist);

        assert!(store.is_empty().unwrap());
        assert!(worker.shared.index.is_empty());
        assert_eq!(worker.shared.counters.snapshot().failed, 1);
    }

    #[test]
    fn panicking_task_is_contained() {
        let (worker, store) = worker();

        apply(&worker, Arc::new(Exploding), Operation::Persist);
        apply(&worker, note(7, "Pin Map"), Operation::Persist);

        assert!(store.exists("Pin_Map_7.xml").unwrap());
        let stats = worker.shared.counters.snapshot();
        assert_eq!((stats.persisted, stats.failed), (1, 1));
    }

    #[test]
    fn run_exits_once_flag_is_cleared() {
        let (worker, _store) = worker();
        let running = Arc::clone(&worker.running);
        let handle = worker.spawn().unwrap();

        running.store(false, Ordering::Release);

        handle.join().unwrap();
    }

    #[test]
    fn panic_message_extracts_text() {
        let from_str = panic::catch_unwind(|| panic!("static text")).unwrap_err();
        let from_string = panic::catch_unwind(|| panic!("{}", 42)).unwrap_err();

        assert_eq!(panic_message(from_str.as_ref()), "static text");
        assert_eq!(panic_message(from_string.as_ref()), "42");
    }
}
