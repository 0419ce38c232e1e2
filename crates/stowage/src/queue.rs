//! Bounded FIFO of pending persistence tasks.
//!
//! Many producers (any caller thread) push with [`TaskQueue::try_enqueue`],
//! which never blocks. One consumer (the worker) pops with
//! [`TaskQueue::dequeue_timeout`], whose timeout doubles as the worker's
//! periodic chance to notice a shutdown request.
//!
//! Besides the queue itself this tracks how many submitted tasks have not
//! finished processing yet, which is what [`TaskQueue::wait_idle`] waits on.

use crate::item::Item;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::trace;

/// What to do with a queued item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Write the item's full state (also used for updates).
    Persist,
    /// Remove the item's file.
    Delete,
    /// Move the item's file to the canonical name for `new_name`.
    Rename {
        /// Name the stored file should be derived from.
        new_name: String,
    },
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persist => f.write_str("persist"),
            Self::Delete => f.write_str("delete"),
            Self::Rename { .. } => f.write_str("rename"),
        }
    }
}

/// A pending mutation request.
#[derive(Debug, Clone)]
pub struct QueuedTask {
    /// The item involved.
    pub item: Arc<dyn Item>,
    /// The mutation to apply.
    pub op: Operation,
}

impl QueuedTask {
    /// Creates a task.
    pub fn new(item: Arc<dyn Item>, op: Operation) -> Self {
        Self { item, op }
    }
}

/// Why a task was not accepted.
#[derive(Debug)]
pub enum EnqueueError {
    /// The queue is at capacity; the task is handed back.
    Full(QueuedTask),
}

/// Bounded multi-producer, single-consumer task queue.
pub struct TaskQueue {
    sender: SyncSender<QueuedTask>,
    receiver: Mutex<Receiver<QueuedTask>>,
    capacity: usize,
    /// Enqueued and not yet dequeued.
    depth: AtomicUsize,
    /// Enqueued and not yet completed or discarded.
    outstanding: Mutex<usize>,
    idle: Condvar,
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("capacity", &self.capacity)
            .field("depth", &self.len())
            .finish_non_exhaustive()
    }
}

impl TaskQueue {
    /// Creates a queue holding at most `capacity` tasks.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0 (a rendezvous channel would reject every
    /// non-blocking submission while the worker is busy).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be at least 1");
        let (sender, receiver) = mpsc::sync_channel(capacity);
        Self {
            sender,
            receiver: Mutex::new(receiver),
            capacity,
            depth: AtomicUsize::new(0),
            outstanding: Mutex::new(0),
            idle: Condvar::new(),
        }
    }

    /// Maximum number of queued tasks.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of tasks waiting to be dequeued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    /// Returns `true` if no task is waiting to be dequeued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds a task without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`EnqueueError::Full`] with the rejected task if the queue is
    /// at capacity. The tasks already queued are unaffected.
    pub fn try_enqueue(&self, task: QueuedTask) -> Result<(), EnqueueError> {
        // Count before sending so a fast consumer never sees a task that is
        // not yet counted.
        self.add_outstanding();
        let depth = self.depth.fetch_add(1, Ordering::AcqRel) + 1;
        match self.sender.try_send(task) {
            Ok(()) => {
                trace!(depth, "Enqueued task");
                Ok(())
            }
            Err(TrySendError::Full(task) | TrySendError::Disconnected(task)) => {
                self.depth.fetch_sub(1, Ordering::AcqRel);
                self.finish_outstanding(1);
                Err(EnqueueError::Full(task))
            }
        }
    }

    /// Takes the oldest task, waiting at most `timeout` for one to arrive.
    ///
    /// Returns `None` on timeout.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<QueuedTask> {
        // Only the worker dequeues; a panic while holding this lock cannot
        // leave the receiver in a bad state.
        let receiver = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);
        match receiver.recv_timeout(timeout) {
            Ok(task) => {
                self.depth.fetch_sub(1, Ordering::AcqRel);
                Some(task)
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Marks one dequeued task as fully processed.
    pub fn complete(&self) {
        self.finish_outstanding(1);
    }

    /// Drops every queued task, returning how many were dropped.
    ///
    /// Returns `None` without dropping anything if the consumer is currently
    /// waiting inside [`dequeue_timeout`](Self::dequeue_timeout).
    pub fn discard_pending(&self) -> Option<usize> {
        let receiver = match self.receiver.try_lock() {
            Ok(receiver) => receiver,
            Err(std::sync::TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(std::sync::TryLockError::WouldBlock) => return None,
        };
        let mut dropped = 0;
        while receiver.try_recv().is_ok() {
            self.depth.fetch_sub(1, Ordering::AcqRel);
            dropped += 1;
        }
        drop(receiver);
        if dropped > 0 {
            self.finish_outstanding(dropped);
        }
        Some(dropped)
    }

    /// Blocks until every submitted task has been completed or discarded,
    /// or until `timeout` elapses. Returns `true` if the queue went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut outstanding = self
            .outstanding
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while *outstanding > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            outstanding = self
                .idle
                .wait_timeout(outstanding, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    fn add_outstanding(&self) {
        *self
            .outstanding
            .lock()
            .unwrap_or_else(PoisonError::into_inner) += 1;
    }

    fn finish_outstanding(&self, n: usize) {
        let mut outstanding = self
            .outstanding
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *outstanding = outstanding.saturating_sub(n);
        if *outstanding == 0 {
            self.idle.notify_all();
        }
    }
}
