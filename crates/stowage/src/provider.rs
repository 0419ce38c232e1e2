//! The public persistence facade.
//!
//! [`PersistenceProvider`] accepts mutation requests from any thread,
//! queues them, and lets a single background worker apply them to the
//! store. Submissions return as soon as the task is queued: `true` means
//! "accepted", not "written". Loads run synchronously on the caller's
//! thread and only read the store.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use stowage::{Note, PersistenceProvider, ProviderConfig, TypeRegistry};
//! # fn main() -> stowage::Result<()> {
//! let mut registry = TypeRegistry::new();
//! registry.register_type::<Note>(Note::KIND);
//! let provider = PersistenceProvider::open_dir("./items", registry, ProviderConfig::default())?;
//! provider.start()?;
//!
//! provider.persist_item(Arc::new(Note::new(7, "Pin Map", "X")));
//! provider.flush(std::time::Duration::from_secs(5));
//! assert!(provider.load_item(7).is_some());
//!
//! provider.stop();
//! # Ok(())
//! # }
//! ```

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::index::ItemIndex;
use crate::item::{Item, ItemId, ItemType};
use crate::naming;
use crate::policy::{PersistPolicy, SkipKinds};
use crate::queue::{EnqueueError, Operation, QueuedTask, TaskQueue};
use crate::registry::TypeRegistry;
use crate::worker::{Counters, Shared, Worker, WorkerStats, panic_message};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use stowage_fs::{DirectoryStore, ItemStore};
use tracing::{debug, error, info, warn};

/// Handle on one run of the worker.
#[derive(Default)]
struct RunState {
    /// Run flag of the current worker; `None` when stopped.
    flag: Option<Arc<AtomicBool>>,
    /// Worker thread that has not been joined yet, possibly from an
    /// earlier run that outlived its `stop()` ceiling.
    handle: Option<JoinHandle<()>>,
}

/// Write-behind persistence for items stored one file each.
pub struct PersistenceProvider {
    shared: Arc<Shared>,
    config: ProviderConfig,
    /// Held by `start()` and `stop()` only; status reads use `running`.
    run: Mutex<RunState>,
    running: AtomicBool,
    loads_started: AtomicBool,
}

impl fmt::Debug for PersistenceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceProvider")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .field("pending", &self.pending())
            .field("indexed", &self.shared.index.len())
            .finish_non_exhaustive()
    }
}

impl PersistenceProvider {
    /// Creates a stopped provider over `store`.
    ///
    /// Persist tasks for kinds listed in
    /// [`ProviderConfig::non_persistable_kinds`] are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `config` is invalid.
    pub fn new(
        store: Arc<dyn ItemStore>,
        registry: TypeRegistry,
        config: ProviderConfig,
    ) -> Result<Self> {
        let policy = SkipKinds::new(config.non_persistable_kinds.iter().cloned());
        Self::with_policy(store, registry, config, policy)
    }

    /// Creates a stopped provider with a custom persist policy.
    ///
    /// The policy replaces the one derived from
    /// [`ProviderConfig::non_persistable_kinds`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `config` is invalid.
    pub fn with_policy(
        store: Arc<dyn ItemStore>,
        registry: TypeRegistry,
        config: ProviderConfig,
        policy: impl PersistPolicy + 'static,
    ) -> Result<Self> {
        config.validate()?;
        let shared = Arc::new(Shared {
            store,
            registry: RwLock::new(registry),
            index: ItemIndex::new(),
            queue: TaskQueue::new(config.queue_capacity),
            policy: Box::new(policy),
            counters: Counters::default(),
        });
        Ok(Self {
            shared,
            config,
            run: Mutex::new(RunState::default()),
            running: AtomicBool::new(false),
            loads_started: AtomicBool::new(false),
        })
    }

    /// Creates a stopped provider storing items in the directory `root`,
    /// creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or `config` is
    /// invalid.
    pub fn open_dir(
        root: impl AsRef<Path>,
        registry: TypeRegistry,
        config: ProviderConfig,
    ) -> Result<Self> {
        let store = DirectoryStore::open(root.as_ref())?;
        Self::new(Arc::new(store), registry, config)
    }

    /// The configuration this provider was built with.
    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Rebuilds the index from the store and launches the worker.
    ///
    /// Does nothing if already running. If the worker of an earlier run is
    /// still finishing a task, waits for it first so that two workers never
    /// drain the queue at once. A `start()` racing a `stop()` on another
    /// thread waits for that `stop()` to return.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed or the worker thread
    /// cannot be spawned. The provider stays stopped in both cases.
    pub fn start(&self) -> Result<()> {
        let mut run = self.lock_run();
        if run.flag.as_ref().is_some_and(|flag| flag.load(Ordering::Acquire)) {
            debug!("Persistence provider already running");
            return Ok(());
        }
        if let Some(handle) = run.handle.take() {
            debug!("Waiting for the previous worker to exit");
            join_worker(handle);
        }

        let indexed = self.shared.index.rebuild_from_store(self.shared.store.as_ref())?;

        let flag = Arc::new(AtomicBool::new(true));
        let worker = Worker::new(
            Arc::clone(&self.shared),
            Arc::clone(&flag),
            self.config.dequeue_timeout(),
        );
        let handle = worker.spawn()?;
        run.flag = Some(flag);
        run.handle = Some(handle);
        self.running.store(true, Ordering::Release);

        info!(indexed, pending = self.pending(), "Persistence provider started");
        Ok(())
    }

    /// Asks the worker to stop and waits for it, up to the configured
    /// shutdown ceiling.
    ///
    /// The task the worker is processing may finish; nothing else is
    /// drained. Tasks still queued when this returns are abandoned and
    /// reported in a warning. Returns normally even if the worker is still
    /// busy when the ceiling is reached.
    ///
    /// Only the calling thread waits: status queries from other threads
    /// report the provider as stopped as soon as the stop is requested.
    pub fn stop(&self) {
        let mut run = self.lock_run();
        let Some(flag) = run.flag.take() else {
            debug!("Persistence provider not running");
            return;
        };
        flag.store(false, Ordering::Release);
        self.running.store(false, Ordering::Release);

        let exited = match run.handle.take() {
            Some(handle) => match self.wait_for_exit(handle) {
                Ok(()) => true,
                Err(handle) => {
                    run.handle = Some(handle);
                    false
                }
            },
            None => true,
        };

        let abandoned = self.shared.queue.discard_pending().unwrap_or(0);
        self.shared.counters.add_abandoned(abandoned);
        if exited {
            if abandoned > 0 {
                warn!(abandoned, "Persistence worker stopped; queued tasks abandoned");
            } else {
                info!("Persistence provider stopped");
            }
        } else {
            warn!(
                abandoned,
                timeout_secs = self.config.shutdown_timeout_secs,
                "Persistence worker did not exit before the shutdown timeout; queued tasks abandoned"
            );
        }
    }

    /// Whether the worker of the current run is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Blocks until every accepted task has been processed or `timeout`
    /// elapses. Returns `true` if nothing is left outstanding.
    ///
    /// A stopped provider does not drain, so this returns immediately.
    pub fn flush(&self, timeout: Duration) -> bool {
        if self.is_running() {
            self.shared.queue.wait_idle(timeout)
        } else {
            self.shared.queue.wait_idle(Duration::ZERO)
        }
    }

    /// Number of tasks queued and not yet picked up by the worker.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    /// Worker counters since this provider was created.
    #[must_use]
    pub fn stats(&self) -> WorkerStats {
        self.shared.counters.snapshot()
    }

    /// Ids currently in the index, ascending.
    #[must_use]
    pub fn indexed_ids(&self) -> Vec<ItemId> {
        self.shared.index.all_ids()
    }

    /// Snapshot of the index as (id, file name) pairs, ascending by id.
    #[must_use]
    pub fn indexed_entries(&self) -> Vec<(ItemId, String)> {
        self.shared.index.entries()
    }

    // ------------------------------------------------------------------
    // Submission
    // ------------------------------------------------------------------

    /// Queues a full write of `item`.
    ///
    /// Returns `false` if the item's name cannot be stored or the queue is
    /// full; `true` means accepted, not written.
    pub fn persist_item(&self, item: Arc<dyn Item>) -> bool {
        if !naming::is_recoverable_name(item.name()) {
            warn!(
                item_id = item.id(),
                name = item.name(),
                "Rejected item: name cannot be stored"
            );
            return false;
        }
        self.submit(QueuedTask::new(item, Operation::Persist))
    }

    /// Same as [`persist_item`](Self::persist_item); every update is a full
    /// overwrite.
    pub fn update_item(&self, item: Arc<dyn Item>) -> bool {
        self.persist_item(item)
    }

    /// Queues removal of `item`'s file. Deleting an item that is not stored
    /// is not an error.
    pub fn delete_item(&self, item: Arc<dyn Item>) -> bool {
        self.submit(QueuedTask::new(item, Operation::Delete))
    }

    /// Queues a move of `item`'s file to the canonical name for `new_name`.
    ///
    /// Only the file moves; the stored contents keep the state of the last
    /// persist. Renaming an item that is not stored changes nothing.
    pub fn rename_item(&self, item: Arc<dyn Item>, new_name: &str) -> bool {
        if !naming::is_recoverable_name(new_name) {
            warn!(
                item_id = item.id(),
                name = new_name,
                "Rejected rename: name cannot be stored"
            );
            return false;
        }
        self.submit(QueuedTask::new(
            item,
            Operation::Rename {
                new_name: new_name.to_string(),
            },
        ))
    }

    fn submit(&self, task: QueuedTask) -> bool {
        match self.shared.queue.try_enqueue(task) {
            Ok(()) => true,
            Err(EnqueueError::Full(task)) => {
                warn!(
                    item_id = task.item.id(),
                    op = %task.op,
                    capacity = self.shared.queue.capacity(),
                    "Rejected task: queue full"
                );
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Retrieval
    // ------------------------------------------------------------------

    /// Loads the stored item with `id`.
    ///
    /// Returns `None` if the id is not indexed or its file cannot be read or
    /// decoded. Never mutates the index.
    pub fn load_item(&self, id: ItemId) -> Option<Arc<dyn Item>> {
        self.loads_started.store(true, Ordering::Release);
        let Some(file) = self.shared.index.lookup(id) else {
            debug!(item_id = id, "Item not indexed");
            return None;
        };
        let item = self.load_file(&file)?;
        if item.id() != id {
            warn!(
                item_id = id,
                file = %file,
                stored_id = item.id(),
                "Stored item id does not match its file name"
            );
            return None;
        }
        Some(item)
    }

    /// Loads the item stored in `file_name`, bypassing the index.
    ///
    /// Same failure contract as [`load_item`](Self::load_item).
    pub fn load_file(&self, file_name: &str) -> Option<Arc<dyn Item>> {
        self.loads_started.store(true, Ordering::Release);
        match self.read_item(file_name) {
            Ok(item) => Some(item),
            Err(Error::Store(stowage_fs::Error::NotFound(_))) => {
                debug!(file = %file_name, "Stored file not found");
                None
            }
            Err(e) => {
                warn!(file = %file_name, error = %e, "Failed to load stored item");
                None
            }
        }
    }

    /// Loads every indexed item, skipping those that fail to load.
    pub fn load_items(&self) -> Vec<Arc<dyn Item>> {
        self.indexed_ids()
            .into_iter()
            .filter_map(|id| self.load_item(id))
            .collect()
    }

    fn read_item(&self, file_name: &str) -> Result<Arc<dyn Item>> {
        let bytes = self.shared.store.read(file_name)?;
        self.shared.registry().decode(&bytes)
    }

    // ------------------------------------------------------------------
    // Type registry
    // ------------------------------------------------------------------

    /// Registers the concrete type of `example` for loading.
    ///
    /// Register every kind before the first load; registering afterwards
    /// works but is logged as a warning.
    pub fn register_type<T: ItemType>(&self, example: &T) {
        if self.loads_started.load(Ordering::Acquire) {
            warn!(
                kind = example.kind(),
                "Item kind registered after loading started"
            );
        }
        self.shared
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(example);
    }

    /// Registered item kinds, sorted.
    #[must_use]
    pub fn registered_kinds(&self) -> Vec<String> {
        self.shared
            .registry()
            .kinds()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn lock_run(&self) -> MutexGuard<'_, RunState> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Polls `handle` until the worker exits or the ceiling passes.
    /// Hands the handle back if the worker is still running.
    fn wait_for_exit(&self, handle: JoinHandle<()>) -> std::result::Result<(), JoinHandle<()>> {
        let deadline = Instant::now() + self.config.shutdown_timeout();
        let poll = self.config.shutdown_poll();
        loop {
            if handle.is_finished() {
                join_worker(handle);
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(handle);
            }
            thread::sleep(poll.min(deadline - now));
        }
    }
}

impl Drop for PersistenceProvider {
    fn drop(&mut self) {
        // The worker notices within one dequeue timeout; dropping never waits.
        self.running.store(false, Ordering::Release);
        if let Some(flag) = self.lock_run().flag.take() {
            flag.store(false, Ordering::Release);
        }
    }
}

fn join_worker(handle: JoinHandle<()>) {
    if let Err(payload) = handle.join() {
        error!(
            panic_msg = %panic_message(payload.as_ref()),
            "Persistence worker thread panicked"
        );
    }
}
