//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;
use stowage::{Item, ItemId, ItemType, Note, ProviderConfig, TypeRegistry};
use stowage_fs::{ItemStore, MemoryStore, StoreEntry};

/// Generous upper bound for draining a handful of tasks.
pub const FLUSH: Duration = Duration::from_secs(5);

/// Config with short wake-up and shutdown intervals so tests stay fast.
pub fn fast_config() -> ProviderConfig {
    ProviderConfig::default()
        .with_dequeue_timeout(Duration::from_millis(10))
        .with_shutdown(5, Duration::from_millis(10))
}

/// Registry knowing [`Note`] and [`Widget`].
pub fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.register_type::<Note>(Note::KIND);
    registry.register(&Widget::default());
    registry
}

pub fn note(id: ItemId, name: &str, body: &str) -> Arc<dyn Item> {
    Arc::new(Note::new(id, name, body))
}

/// A second item kind with a structured payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    pub id: ItemId,
    pub name: String,
    pub size: (u32, u32),
    pub weight: f64,
    pub tags: Vec<String>,
}

impl Item for Widget {
    fn id(&self) -> ItemId {
        self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> &str {
        "widget"
    }
    fn to_payload(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ItemType for Widget {
    fn from_payload(payload: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(payload)
    }
}

/// An in-memory store whose writes take an adjustable delay each.
pub struct SlowStore {
    inner: MemoryStore,
    delay_ms: AtomicU64,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Self {
        let store = Self {
            inner: MemoryStore::new(),
            delay_ms: AtomicU64::new(0),
        };
        store.set_delay(delay);
        store
    }

    pub fn set_delay(&self, delay: Duration) {
        let ms = u64::try_from(delay.as_millis()).unwrap();
        self.delay_ms.store(ms, Ordering::SeqCst);
    }

    fn pause(&self) {
        thread::sleep(Duration::from_millis(self.delay_ms.load(Ordering::SeqCst)));
    }
}

impl ItemStore for SlowStore {
    fn exists(&self, name: &str) -> stowage_fs::Result<bool> {
        self.inner.exists(name)
    }

    fn create(&self, name: &str, bytes: &[u8]) -> stowage_fs::Result<()> {
        self.pause();
        self.inner.create(name, bytes)
    }

    fn overwrite(&self, name: &str, bytes: &[u8]) -> stowage_fs::Result<()> {
        self.pause();
        self.inner.overwrite(name, bytes)
    }

    fn read(&self, name: &str) -> stowage_fs::Result<Vec<u8>> {
        self.inner.read(name)
    }

    fn delete(&self, name: &str) -> stowage_fs::Result<()> {
        self.inner.delete(name)
    }

    fn rename(&self, from: &str, to: &str) -> stowage_fs::Result<()> {
        self.inner.rename(from, to)
    }

    fn list(&self) -> stowage_fs::Result<Vec<StoreEntry>> {
        self.inner.list()
    }
}

/// Run the stowage binary against `store`.
pub fn run_stowage(store: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_stowage"))
        .arg("--store")
        .arg(store)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute stowage binary")
}
