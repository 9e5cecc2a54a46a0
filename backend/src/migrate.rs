//! Migration pipeline
//!
//! Walks the source items in order, maps each one to canonical fields and a
//! relative path, and hands it to the destination. Cleanup of stale entries
//! runs once at the end, and only after a complete run.

use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::{BackendError, BackendResult};
use crate::storage::{open_destination, Destination};
use passferry_shared::mapping::{derive_path, map_item};
use passferry_shared::models::{FoldersMap, SourceItem};
use passferry_shared::registry::PathRegistry;
use passferry_shared::source::{EnpassJsonSource, SecretSource};

/// Load an export file and migrate it into the configured destination
pub fn migrate_file<P: AsRef<Path>>(
    config: &Config,
    source_path: P,
    cancel: CancelToken,
) -> BackendResult<MigrationReport> {
    let source = EnpassJsonSource::open(source_path)?;
    info!("Loaded {} items from {:?}", source.item_count(), source.path());

    let registry = Arc::new(PathRegistry::new());
    let destination = open_destination(config, registry, cancel.clone())?;

    Migrator::new(destination, cancel)
        .continue_on_error(config.run.continue_on_error)
        .run(&source)
}

/// Counters collected over one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub processed: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub removed: usize,
    pub cancelled: bool,
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} items processed: {} changed, {} unchanged, {} skipped; {} stale entries removed",
            self.processed, self.changed, self.unchanged, self.skipped, self.removed
        )?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}

/// Drives one migration into a destination
pub struct Migrator {
    destination: Box<dyn Destination + Send>,
    cancel: CancelToken,
    continue_on_error: bool,
}

impl Migrator {
    pub fn new(destination: Box<dyn Destination + Send>, cancel: CancelToken) -> Self {
        Self {
            destination,
            cancel,
            continue_on_error: false,
        }
    }

    /// Log and skip items that fail to map or encode instead of aborting
    pub fn continue_on_error(mut self, enabled: bool) -> Self {
        self.continue_on_error = enabled;
        self
    }

    /// Migrate every item of `source`, then clean up and close the destination
    pub fn run<S: SecretSource + ?Sized>(mut self, source: &S) -> BackendResult<MigrationReport> {
        let items = source.load_items();
        let folders = source.folders_map();
        let mut report = MigrationReport::default();

        info!("Migrating {} items", items.len());

        for item in items {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            report.processed += 1;
            match self.migrate_item(item, folders) {
                Ok(true) => report.changed += 1,
                Ok(false) => report.unchanged += 1,
                Err(e) if e.is_cancelled() => {
                    report.cancelled = true;
                    break;
                }
                Err(e) if self.continue_on_error && !e.is_store_error() => {
                    warn!("Skipping item: {}", e);
                    report.skipped += 1;
                }
                Err(e) => {
                    error!("{}", e);
                    return Err(e);
                }
            }
        }

        if report.cancelled {
            warn!("Run cancelled after {} items, cleanup skipped", report.processed);
        } else if report.skipped > 0 {
            warn!(
                "{} items were skipped, cleanup skipped to keep their stored copies",
                report.skipped
            );
        } else {
            self.destination.cleanup()?;
            report.removed = self.destination.removed_count();
        }

        self.destination.close()?;
        info!("{}", report);
        Ok(report)
    }

    fn migrate_item(&mut self, item: &SourceItem, folders: &FoldersMap) -> BackendResult<bool> {
        let path = derive_path(item, folders)
            .map_err(|e| BackendError::from(e).for_item(item.title.as_str(), ""))?;
        debug!("Item {:?} -> {:?}", item.title, path);

        let fields = map_item(item, folders)
            .map_err(|e| BackendError::from(e).for_item(item.title.as_str(), path.as_str()))?;

        self.destination
            .save(&fields, &path)
            .map_err(|e| e.for_item(item.title.as_str(), path.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::storage::{DestinationOptions, KeyValueDestination, MemoryBackend};
    use assert_matches::assert_matches;
    use passferry_shared::registry::PathRegistry;
    use passferry_shared::source::EnpassJsonSource;
    use std::sync::Arc;

    const EXPORT: &str = r#"{
        "folders": [{"uuid": "f1", "title": "Личное"}],
        "items": [
            {"title": "Bank", "category": "Finance", "fields": [
                {"type": "password", "label": "Password", "value": "secret", "sensitive": 1}
            ]},
            {"title": "Bank", "category": "Finance"},
            {"title": "", "category": "Login"},
            {"title": "Mail", "category": "Login", "trashed": 1, "folders": ["f1"]}
        ]
    }"#;

    fn migrator(backend: &MemoryBackend, cancel: &CancelToken) -> Migrator {
        let destination = KeyValueDestination::new(
            backend.clone(),
            Arc::new(PathRegistry::new()),
            DestinationOptions {
                prefix: "enpass".to_string(),
                dry_run: false,
            },
        );
        Migrator::new(Box::new(destination), cancel.clone())
    }

    fn source() -> EnpassJsonSource {
        EnpassJsonSource::from_slice(EXPORT.as_bytes()).unwrap()
    }

    #[test]
    fn test_fail_fast_on_bad_item() {
        let backend = MemoryBackend::new();
        let result = migrator(&backend, &CancelToken::new()).run(&source());

        assert_matches!(result, Err(BackendError::Item { .. }));
        assert!(backend.content("enpass/finance/bank/data").is_some());
        assert!(backend.content("enpass/trash/login/lichnoe/mail/data").is_none());
    }

    #[test]
    fn test_continue_on_error_skips_and_keeps_stale() {
        let backend = MemoryBackend::new();
        backend.insert("enpass/old/stale/data", b"stale");

        let report = migrator(&backend, &CancelToken::new())
            .continue_on_error(true)
            .run(&source())
            .unwrap();

        assert_eq!(report.processed, 4);
        assert_eq!(report.changed, 3);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.removed, 0);
        assert!(backend.content("enpass/finance/bank_2/data").is_some());
        assert!(backend.content("enpass/trash/login/lichnoe/mail/data").is_some());
        assert!(backend.content("enpass/old/stale/data").is_some());
    }

    #[test]
    fn test_cancelled_run_stops_early() {
        let backend = MemoryBackend::new();
        backend.insert("enpass/old/stale/data", b"stale");
        let cancel = CancelToken::new();
        cancel.cancel();

        let report = migrator(&backend, &cancel).run(&source()).unwrap();

        assert!(report.cancelled);
        assert_eq!(report.processed, 0);
        assert_eq!(backend.write_count(), 0);
        assert!(backend.content("enpass/old/stale/data").is_some());
    }

    #[test]
    fn test_store_errors_abort_even_when_continuing() {
        let backend = MemoryBackend::new();
        backend.fail_writes(true);

        let err = migrator(&backend, &CancelToken::new())
            .continue_on_error(true)
            .run(&source())
            .unwrap_err();

        assert!(err.is_store_error());
        assert_matches!(
            err,
            BackendError::Item { source, .. } if matches!(*source, BackendError::Store(StoreError::Io { .. }))
        );
    }

    #[test]
    fn test_report_display() {
        let report = MigrationReport {
            processed: 3,
            changed: 1,
            unchanged: 2,
            cancelled: true,
            ..Default::default()
        };
        let text = report.to_string();
        assert!(text.starts_with("3 items processed: 1 changed, 2 unchanged"));
        assert!(text.ends_with("(cancelled)"));
    }
}
