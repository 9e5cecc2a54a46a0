//! Destination storage for passferry
//!
//! Every destination implements [`Destination`]: encode the canonical
//! fields, write only what changed, and remove stale entries once the run
//! is over. Key-value stores share one adapter over the [`SecretBackend`]
//! collaborator; the KeePass-style database has its own adapter over
//! [`keepass::EntryDatabase`].
//!
//! Key features:
//! - Collision-free paths through the shared [`PathRegistry`]
//! - SHA-256 diffing so unchanged secrets are never rewritten
//! - Dry-run mode that reports changes without writing or deleting
//! - Cleanup of entries under the prefix not touched this run

pub mod directory;
pub mod file_lock;
pub mod gopass;
pub mod keepass;
pub mod kv;
pub mod memory;

use std::sync::Arc;
use tracing::info;

use crate::cancel::CancelToken;
use crate::config::{Config, DestinationKind};
use crate::error::{BackendResult, ConfigError, StoreResult};
use passferry_shared::models::CanonicalField;
use passferry_shared::registry::PathRegistry;

pub use directory::DirectoryBackend;
pub use gopass::GopassCliBackend;
pub use keepass::{EntryDatabase, KeepassDestination, YamlEntryDatabase};
pub use kv::KeyValueDestination;
pub use memory::MemoryBackend;

/// A destination store the pipeline writes into
pub trait Destination {
    /// Encode and store one item under `relative`; true when anything changed
    fn save(&mut self, fields: &[CanonicalField], relative: &str) -> BackendResult<bool>;

    /// Remove entries under the prefix not written this run; true when
    /// anything was (or in dry-run would be) removed
    fn cleanup(&mut self) -> BackendResult<bool>;

    /// Flush and release the store
    fn close(&mut self) -> BackendResult<()>;

    /// Number of entries removed (or that would be removed) by cleanup
    fn removed_count(&self) -> usize;
}

/// Raw key-value secret store
///
/// Keys are `/`-separated paths. A missing key is reported either as
/// `Ok(None)` or as [`crate::error::StoreError::NotFound`].
pub trait SecretBackend {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Write a secret, replacing any existing content
    fn set(&mut self, key: &str, data: &[u8]) -> StoreResult<()>;

    /// Every key starting with `prefix`
    fn list(&self, prefix: &str) -> StoreResult<Vec<String>>;

    fn remove(&mut self, key: &str) -> StoreResult<()>;

    fn close(&mut self) -> StoreResult<()> {
        Ok(())
    }
}

/// Settings every adapter needs
#[derive(Debug, Clone)]
pub struct DestinationOptions {
    /// Root path segment, without leading or trailing `/`
    pub prefix: String,

    /// Compute changes without writing or deleting
    pub dry_run: bool,
}

impl DestinationOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            prefix: config.destination.prefix.clone(),
            dry_run: config.run.dry_run,
        }
    }
}

/// Open the destination selected in the configuration
pub fn open_destination(
    config: &Config,
    registry: Arc<PathRegistry>,
    cancel: CancelToken,
) -> BackendResult<Box<dyn Destination + Send>> {
    let options = DestinationOptions::from_config(config);
    info!(
        "Opening {} destination with prefix {:?}{}",
        config.destination.kind,
        options.prefix,
        if options.dry_run { " (dry-run)" } else { "" }
    );

    match config.destination.kind {
        DestinationKind::Gopass => {
            let backend = GopassCliBackend::new(&config.destination.gopass_binary, cancel);
            Ok(Box::new(KeyValueDestination::new(backend, registry, options)))
        }
        DestinationKind::Directory => {
            let root = config
                .destination
                .store_dir
                .clone()
                .ok_or_else(|| ConfigError::Invalid {
                    field: "destination.store_dir".to_string(),
                    reason: "required for the directory destination".to_string(),
                })?;
            let backend = DirectoryBackend::open(root)?;
            Ok(Box::new(KeyValueDestination::new(backend, registry, options)))
        }
        DestinationKind::Keepass => {
            let path = config
                .destination
                .database_path
                .clone()
                .ok_or_else(|| ConfigError::Invalid {
                    field: "destination.database_path".to_string(),
                    reason: "required for the keepass destination".to_string(),
                })?;
            let database = YamlEntryDatabase::open(&path, config.lock_timeout())?;
            Ok(Box::new(KeepassDestination::new(database, registry, options)))
        }
    }
}

/// Join a prefix and path segments into a store key
pub fn store_key(prefix: &str, segments: &[&str]) -> String {
    let mut key = prefix.trim_end_matches('/').to_string();
    for segment in segments.iter().filter(|s| !s.is_empty()) {
        if !key.is_empty() {
            key.push('/');
        }
        key.push_str(segment.trim_matches('/'));
    }
    key
}
