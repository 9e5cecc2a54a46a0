//! KeePass-style database destination
//!
//! Entries live in a tree of named groups, addressed by `/`-separated keys
//! whose last segment is the entry name. [`YamlEntryDatabase`] persists the
//! tree as YAML and holds an exclusive lock on the file while open.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::file_lock::DatabaseLock;
use super::{store_key, Destination, DestinationOptions};
use crate::error::{BackendResult, StoreError, StoreResult};
use passferry_shared::encoding::{KeepassEncoder, KeepassEntry};
use passferry_shared::models::CanonicalField;
use passferry_shared::registry::PathRegistry;
use passferry_shared::utils::hash::sha256_hex;

/// Entry store addressed by group path keys
pub trait EntryDatabase {
    fn get(&self, key: &str) -> StoreResult<Option<KeepassEntry>>;

    /// Insert or replace the entry at `key`, creating groups as needed
    fn put(&mut self, key: &str, entry: KeepassEntry) -> StoreResult<()>;

    /// Keys of every entry starting with `prefix`
    fn list(&self, prefix: &str) -> StoreResult<Vec<String>>;

    fn remove(&mut self, key: &str) -> StoreResult<()>;

    /// Persist pending changes
    fn flush(&mut self) -> StoreResult<()>;
}

/// Named entry inside a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedEntry {
    pub name: String,

    #[serde(flatten)]
    pub entry: KeepassEntry,
}

/// Group node of the database tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<Group>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<NamedEntry>,
}

impl Group {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.entries.is_empty()
    }

    fn find(&self, path: &[&str]) -> Option<&Group> {
        match path.split_first() {
            None => Some(self),
            Some((head, rest)) => self
                .groups
                .iter()
                .find(|g| g.name == *head)
                .and_then(|g| g.find(rest)),
        }
    }

    fn child_mut(&mut self, name: &str) -> &mut Group {
        let index = match self.groups.iter().position(|g| g.name == name) {
            Some(index) => index,
            None => {
                self.groups.push(Group::named(name));
                self.groups.len() - 1
            }
        };
        &mut self.groups[index]
    }

    /// Remove an entry and any groups left empty on the way; true when found
    fn remove_entry(&mut self, path: &[&str], name: &str) -> bool {
        match path.split_first() {
            None => {
                let before = self.entries.len();
                self.entries.retain(|e| e.name != name);
                before != self.entries.len()
            }
            Some((head, rest)) => {
                let Some(index) = self.groups.iter().position(|g| g.name == *head) else {
                    return false;
                };
                let removed = self.groups[index].remove_entry(rest, name);
                if removed && self.groups[index].is_empty() {
                    self.groups.remove(index);
                }
                removed
            }
        }
    }

    fn collect_keys(&self, base: &str, out: &mut Vec<String>) {
        for entry in &self.entries {
            out.push(join_key(base, &entry.name));
        }
        for group in &self.groups {
            group.collect_keys(&join_key(base, &group.name), out);
        }
    }
}

fn join_key(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", base, name)
    }
}

/// Split a key into its group path and entry name
fn split_key(key: &str) -> StoreResult<(Vec<&str>, &str)> {
    let (groups, name) = match key.rsplit_once('/') {
        Some((groups, name)) => (groups.split('/').collect::<Vec<_>>(), name),
        None => (Vec::new(), key),
    };

    if name.is_empty() || groups.iter().any(|g| g.is_empty()) {
        return Err(StoreError::Serialization {
            reason: format!("invalid entry key {:?}", key),
        });
    }

    Ok((groups, name))
}

/// On-disk layout of the database file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DatabaseFile {
    #[serde(default)]
    root: Group,
}

/// [`EntryDatabase`] persisted as a YAML file
#[derive(Debug)]
pub struct YamlEntryDatabase {
    path: PathBuf,
    root: Group,
    dirty: bool,
    _lock: DatabaseLock,
}

impl YamlEntryDatabase {
    /// Lock and load the database at `path`; a missing file starts empty
    pub fn open<P: AsRef<Path>>(path: P, lock_timeout: Duration) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let lock = DatabaseLock::acquire(&path, lock_timeout)?;

        let root = if path.exists() {
            let content =
                fs::read_to_string(&path).map_err(|e| StoreError::io(path.to_string_lossy(), e))?;
            let file: DatabaseFile =
                serde_yaml::from_str(&content).map_err(|e| StoreError::Serialization {
                    reason: format!("cannot parse {:?}: {}", path, e),
                })?;
            file.root
        } else {
            debug!("Database {:?} does not exist yet, starting empty", path);
            Group::default()
        };

        info!("Database opened: {:?}", path);
        Ok(Self {
            path,
            root,
            dirty: false,
            _lock: lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> &Group {
        &self.root
    }
}

impl EntryDatabase for YamlEntryDatabase {
    fn get(&self, key: &str) -> StoreResult<Option<KeepassEntry>> {
        let (groups, name) = split_key(key)?;
        Ok(self
            .root
            .find(&groups)
            .and_then(|g| g.entries.iter().find(|e| e.name == name))
            .map(|e| e.entry.clone()))
    }

    fn put(&mut self, key: &str, entry: KeepassEntry) -> StoreResult<()> {
        let (groups, name) = split_key(key)?;

        let mut group = &mut self.root;
        for segment in groups {
            group = group.child_mut(segment);
        }

        match group.entries.iter_mut().find(|e| e.name == name) {
            Some(existing) => existing.entry = entry,
            None => group.entries.push(NamedEntry {
                name: name.to_string(),
                entry,
            }),
        }

        self.dirty = true;
        Ok(())
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        self.root.collect_keys("", &mut keys);
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    fn remove(&mut self, key: &str) -> StoreResult<()> {
        let (groups, name) = split_key(key)?;
        if self.root.remove_entry(&groups, name) {
            self.dirty = true;
            Ok(())
        } else {
            Err(StoreError::NotFound {
                key: key.to_string(),
            })
        }
    }

    fn flush(&mut self) -> StoreResult<()> {
        if !self.dirty {
            debug!("Database {:?} unchanged, nothing to flush", self.path);
            return Ok(());
        }

        let file = DatabaseFile {
            root: self.root.clone(),
        };
        let content = serde_yaml::to_string(&file).map_err(|e| StoreError::Serialization {
            reason: e.to_string(),
        })?;

        let key = self.path.to_string_lossy().to_string();
        let mut temp_name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        temp_name.push(".tmp");
        let temp_path = self.path.with_file_name(temp_name);

        fs::write(&temp_path, content).map_err(|e| StoreError::io(key.clone(), e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&temp_path)
                .map_err(|e| StoreError::io(key.clone(), e))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&temp_path, perms).map_err(|e| StoreError::io(key.clone(), e))?;
        }

        fs::rename(&temp_path, &self.path).map_err(|e| StoreError::io(key, e))?;
        self.dirty = false;

        info!("Database written: {:?}", self.path);
        Ok(())
    }
}

/// [`Destination`] writing one database entry per item
pub struct KeepassDestination<D: EntryDatabase> {
    database: D,
    registry: Arc<PathRegistry>,
    options: DestinationOptions,
    removed: usize,
}

impl<D: EntryDatabase> KeepassDestination<D> {
    pub fn new(database: D, registry: Arc<PathRegistry>, options: DestinationOptions) -> Self {
        Self {
            database,
            registry,
            options,
            removed: 0,
        }
    }

    pub fn database(&self) -> &D {
        &self.database
    }

    fn fingerprint(entry: &KeepassEntry) -> StoreResult<String> {
        let serialized = serde_yaml::to_string(entry).map_err(|e| StoreError::Serialization {
            reason: e.to_string(),
        })?;
        Ok(sha256_hex(serialized.as_bytes()))
    }
}

impl<D: EntryDatabase> Destination for KeepassDestination<D> {
    fn save(&mut self, fields: &[CanonicalField], relative: &str) -> BackendResult<bool> {
        let entry = KeepassEncoder::encode(fields)?;
        let key = self
            .registry
            .allocate(&store_key(&self.options.prefix, &[relative]));

        if let Some(current) = self.database.get(&key)? {
            if Self::fingerprint(&current)? == Self::fingerprint(&entry)? {
                debug!(key = %key, "entry unchanged");
                return Ok(false);
            }
        }

        if self.options.dry_run {
            info!(key = %key, "would write entry (dry-run)");
            return Ok(true);
        }

        self.database.put(&key, entry)?;
        info!(key = %key, "entry written");
        Ok(true)
    }

    fn cleanup(&mut self) -> BackendResult<bool> {
        let prefix = format!("{}/", self.options.prefix);
        let keys = self.database.list(&prefix)?;

        let mut removed_any = false;
        for key in keys {
            if self.registry.has(&key) {
                continue;
            }

            if self.options.dry_run {
                info!(key = %key, "would remove stale entry (dry-run)");
            } else {
                self.database.remove(&key)?;
                info!(key = %key, "removed stale entry");
            }
            self.removed += 1;
            removed_any = true;
        }

        Ok(removed_any)
    }

    fn close(&mut self) -> BackendResult<()> {
        if self.options.dry_run {
            debug!("Dry-run, database left untouched");
            return Ok(());
        }
        self.database.flush()?;
        Ok(())
    }

    fn removed_count(&self) -> usize {
        self.removed
    }
}
