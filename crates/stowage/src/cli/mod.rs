//! CLI command implementations.

pub mod ls;
pub mod mv;
pub mod put;
pub mod rm;
pub mod show;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, Result, bail};
use stowage::{CONFIG_FILE_NAME, Note, PersistenceProvider, ProviderConfig, TypeRegistry};

/// How long a command waits for its queued writes.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(30);

/// Options shared by every command.
pub struct Context {
    /// Store directory.
    pub store: PathBuf,
    /// Explicit configuration file, if any.
    pub config: Option<PathBuf>,
}

impl Context {
    /// Opens the store and starts a provider over it.
    pub fn open(&self) -> Result<PersistenceProvider> {
        let config = self.load_config()?;
        let mut registry = TypeRegistry::new();
        registry.register_type::<Note>(Note::KIND);

        let provider = PersistenceProvider::open_dir(&self.store, registry, config)
            .with_context(|| format!("failed to open store {}", self.store.display()))?;
        provider
            .start()
            .with_context(|| format!("failed to start provider on {}", self.store.display()))?;
        Ok(provider)
    }

    fn load_config(&self) -> Result<ProviderConfig> {
        if let Some(path) = &self.config {
            return load_config_file(path);
        }
        let default_path = self.store.join(CONFIG_FILE_NAME);
        if default_path.is_file() {
            return load_config_file(&default_path);
        }
        // One-shot commands should not sit out a full worker wake-up period.
        Ok(ProviderConfig::default()
            .with_dequeue_timeout(Duration::from_millis(100))
            .with_shutdown(
                ProviderConfig::default().shutdown_timeout_secs,
                Duration::from_millis(50),
            ))
    }
}

fn load_config_file(path: &Path) -> Result<ProviderConfig> {
    ProviderConfig::load(path).with_context(|| format!("failed to load config {}", path.display()))
}

/// Waits for queued writes, stops the provider, and reports failed tasks.
pub fn finish(provider: &PersistenceProvider) -> Result<()> {
    let drained = provider.flush(FLUSH_TIMEOUT);
    provider.stop();
    if !drained {
        bail!(
            "timed out after {}s waiting for queued writes",
            FLUSH_TIMEOUT.as_secs()
        );
    }
    let failed = provider.stats().failed;
    if failed > 0 {
        bail!("{failed} write(s) failed; rerun with -v for details");
    }
    Ok(())
}
