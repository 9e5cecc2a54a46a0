//! Key-value destination adapter
//!
//! Writes each item as a primary bundle at `prefix/<item>/data` and every
//! binary attachment at `prefix/<item>/attachments/<name>`, all keys going
//! through the path registry.

use std::sync::Arc;
use tracing::{debug, info};

use super::{store_key, Destination, DestinationOptions, SecretBackend};
use crate::error::{BackendResult, StoreResult};
use passferry_shared::constants::{ATTACHMENTS_DIR, PRIMARY_LEAF};
use passferry_shared::encoding::BundleEncoder;
use passferry_shared::models::{CanonicalField, FieldUtils};
use passferry_shared::registry::PathRegistry;
use passferry_shared::utils::hash::sha256_hex;
use passferry_shared::utils::string_utils::truncate_with_ellipsis;

/// Longest body preview printed at debug level
const PREVIEW_CHARS: usize = 2000;

/// [`Destination`] over any [`SecretBackend`]
pub struct KeyValueDestination<B: SecretBackend> {
    backend: B,
    registry: Arc<PathRegistry>,
    options: DestinationOptions,
    removed: usize,
}

impl<B: SecretBackend> KeyValueDestination<B> {
    pub fn new(backend: B, registry: Arc<PathRegistry>, options: DestinationOptions) -> Self {
        Self {
            backend,
            registry,
            options,
            removed: 0,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Current content of a key, a miss being `None`
    fn current(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        match self.backend.get(key) {
            Ok(content) => Ok(content),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write one serialized bundle unless the stored copy is identical
    fn save_bundle(&mut self, key: &str, data: &[u8], printable: bool) -> BackendResult<bool> {
        let current = self.current(key)?;
        let new_hash = sha256_hex(data);

        if let Some(old) = &current {
            if sha256_hex(old) == new_hash {
                debug!(key = %key, "secret unchanged");
                return Ok(false);
            }
        }

        if printable {
            let old_text = current
                .as_deref()
                .map(|b| String::from_utf8_lossy(b).into_owned())
                .unwrap_or_default();
            debug!(
                key = %key,
                "old content:\n{}\nnew content:\n{}",
                truncate_with_ellipsis(&old_text, PREVIEW_CHARS),
                truncate_with_ellipsis(&String::from_utf8_lossy(data), PREVIEW_CHARS)
            );
        }

        if self.options.dry_run {
            info!(key = %key, "would write secret (dry-run)");
            return Ok(true);
        }

        self.backend.set(key, data)?;
        info!(key = %key, "secret written");
        Ok(true)
    }
}

impl<B: SecretBackend> Destination for KeyValueDestination<B> {
    fn save(&mut self, fields: &[CanonicalField], relative: &str) -> BackendResult<bool> {
        let encoded = BundleEncoder::encode(fields)?;
        let printable = !FieldUtils::any_sensitive(fields);

        let item = self.registry.allocate(relative);
        let primary_key = self
            .registry
            .allocate(&store_key(&self.options.prefix, &[item.as_str(), PRIMARY_LEAF]));

        let mut changed = self.save_bundle(&primary_key, &encoded.primary.to_bytes(), printable)?;

        for (name, bundle) in &encoded.attachments {
            let leaf = name.replace('/', "_");
            let key = self.registry.allocate(&store_key(
                &self.options.prefix,
                &[item.as_str(), ATTACHMENTS_DIR, leaf.as_str()],
            ));
            changed |= self.save_bundle(&key, &bundle.to_bytes(), false)?;
        }

        Ok(changed)
    }

    fn cleanup(&mut self) -> BackendResult<bool> {
        let prefix = format!("{}/", self.options.prefix);
        let keys = self.backend.list(&prefix)?;
        debug!("Cleanup found {} keys under {:?}", keys.len(), prefix);

        let mut removed_any = false;
        for key in keys {
            if self.registry.has(&key) {
                continue;
            }

            if self.options.dry_run {
                info!(key = %key, "would remove stale secret (dry-run)");
            } else {
                self.backend.remove(&key)?;
                info!(key = %key, "removed stale secret");
            }
            self.removed += 1;
            removed_any = true;
        }

        Ok(removed_any)
    }

    fn close(&mut self) -> BackendResult<()> {
        self.backend.close()?;
        Ok(())
    }

    fn removed_count(&self) -> usize {
        self.removed
    }
}
