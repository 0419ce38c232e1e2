//! Provider configuration.
//!
//! Configuration can be built in code with the `with_*` setters or loaded
//! from a YAML file. Every key is optional:
//!
//! ```yaml
//! queue-capacity: 1024
//! dequeue-timeout-ms: 2000
//! shutdown-timeout-secs: 60
//! shutdown-poll-ms: 1000
//! non-persistable-kinds:
//!   - reactor-analyzer
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default task queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default worker dequeue timeout.
pub const DEFAULT_DEQUEUE_TIMEOUT_MS: u64 = 2000;

/// Default ceiling for `stop()`.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 60;

/// Default interval at which `stop()` checks whether the worker exited.
pub const DEFAULT_SHUTDOWN_POLL_MS: u64 = 1000;

/// Name of the configuration file the CLI looks for in the store directory.
pub const CONFIG_FILE_NAME: &str = "stowage.yaml";

/// Tunables for a [`PersistenceProvider`](crate::provider::PersistenceProvider).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProviderConfig {
    /// Maximum number of queued tasks before submissions are rejected.
    pub queue_capacity: usize,

    /// How long the worker waits for a task before re-checking its run flag.
    pub dequeue_timeout_ms: u64,

    /// How long `stop()` waits for the worker before giving up.
    pub shutdown_timeout_secs: u64,

    /// How often `stop()` checks whether the worker exited.
    pub shutdown_poll_ms: u64,

    /// Item kinds whose persist tasks are dropped.
    pub non_persistable_kinds: Vec<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            dequeue_timeout_ms: DEFAULT_DEQUEUE_TIMEOUT_MS,
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            shutdown_poll_ms: DEFAULT_SHUTDOWN_POLL_MS,
            non_persistable_kinds: Vec::new(),
        }
    }
}

impl ProviderConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid YAML, or
    /// fails [`validate`](Self::validate).
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            serde_yaml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::Config(format!("YAML error: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero queue capacity, dequeue timeout
    /// or shutdown poll interval.
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::Config(
                "queue-capacity must be at least 1".to_string(),
            ));
        }
        if self.dequeue_timeout_ms == 0 {
            return Err(Error::Config(
                "dequeue-timeout-ms must be greater than 0".to_string(),
            ));
        }
        if self.shutdown_poll_ms == 0 {
            return Err(Error::Config(
                "shutdown-poll-ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Sets the queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the worker dequeue timeout (millisecond precision).
    #[must_use]
    pub fn with_dequeue_timeout(mut self, timeout: Duration) -> Self {
        self.dequeue_timeout_ms = duration_to_millis(timeout);
        self
    }

    /// Sets the `stop()` ceiling in seconds and its poll interval
    /// (millisecond precision).
    #[must_use]
    pub fn with_shutdown(mut self, timeout_secs: u64, poll: Duration) -> Self {
        self.shutdown_timeout_secs = timeout_secs;
        self.shutdown_poll_ms = duration_to_millis(poll);
        self
    }

    /// Adds a kind whose persist tasks are dropped.
    #[must_use]
    pub fn with_non_persistable_kind(mut self, kind: impl Into<String>) -> Self {
        self.non_persistable_kinds.push(kind.into());
        self
    }

    /// Worker dequeue timeout.
    #[must_use]
    pub fn dequeue_timeout(&self) -> Duration {
        Duration::from_millis(self.dequeue_timeout_ms)
    }

    /// `stop()` ceiling.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// `stop()` poll interval.
    #[must_use]
    pub fn shutdown_poll(&self) -> Duration {
        Duration::from_millis(self.shutdown_poll_ms)
    }
}

fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
