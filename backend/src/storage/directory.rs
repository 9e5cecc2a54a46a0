//! Plain directory secret backend
//!
//! Each key is a `<key>.secret` file under the root directory, `/` in the
//! key mapping to subdirectories. The suffix lets `a/data` and `a/data/data`
//! coexist. Files are created owner-readable only.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use super::SecretBackend;
use crate::error::{StoreError, StoreResult};

/// Appended to the last key segment to form the file name
pub const SECRET_SUFFIX: &str = ".secret";

/// [`SecretBackend`] writing one file per key
#[derive(Debug, Clone)]
pub struct DirectoryBackend {
    root: PathBuf,
}

impl DirectoryBackend {
    /// Use `root` as store root, creating it when missing
    pub fn open<P: AsRef<Path>>(root: P) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| StoreError::io(root.to_string_lossy(), e))?;
        debug!("Directory store opened at {:?}", root);
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path for a key; keys may not escape the root
    fn key_path(&self, key: &str) -> StoreResult<PathBuf> {
        let relative = Path::new(key);
        let escapes = key.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));

        if escapes {
            return Err(Self::invalid_key(key, "key is not a relative store path"));
        }

        // a directory named like a secret file would shadow that file's key
        let mut segments = key.split('/');
        segments.next_back();
        if segments.any(|s| s.ends_with(SECRET_SUFFIX)) {
            return Err(Self::invalid_key(key, "directory segment ends with the secret suffix"));
        }

        let mut path = self.root.join(relative);
        let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(SECRET_SUFFIX);
        path.set_file_name(name);
        Ok(path)
    }

    fn invalid_key(key: &str, reason: &str) -> StoreError {
        StoreError::io(key, std::io::Error::new(ErrorKind::InvalidInput, reason.to_string()))
    }

    fn collect_keys(&self, dir: &Path, out: &mut Vec<String>) -> StoreResult<()> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StoreError::io(dir.to_string_lossy(), e)),
        };

        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(dir.to_string_lossy(), e))?;
            let path = entry.path();
            let file_type = entry
                .file_type()
                .map_err(|e| StoreError::io(path.to_string_lossy(), e))?;

            if file_type.is_dir() {
                self.collect_keys(&path, out)?;
            } else if file_type.is_file() {
                if let Ok(relative) = path.strip_prefix(&self.root) {
                    let file = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                        .join("/");
                    // files without the suffix are not ours
                    if let Some(key) = file.strip_suffix(SECRET_SUFFIX) {
                        if !key.is_empty() && !key.ends_with('/') {
                            out.push(key.to_string());
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Remove empty directories between `dir` and the root
    fn prune_empty_parents(&self, mut dir: &Path) {
        while dir != self.root && dir.starts_with(&self.root) {
            if fs::remove_dir(dir).is_err() {
                break;
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
    }
}

impl SecretBackend for DirectoryBackend {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.key_path(key)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(key, e)),
        }
    }

    fn set(&mut self, key: &str, data: &[u8]) -> StoreResult<()> {
        let path = self.key_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(key, e))?;
        }

        fs::write(&path, data).map_err(|e| StoreError::io(key, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&path)
                .map_err(|e| StoreError::io(key, e))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&path, perms).map_err(|e| StoreError::io(key, e))?;
        }

        Ok(())
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        self.collect_keys(&self.root, &mut keys)?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    fn remove(&mut self, key: &str) -> StoreResult<()> {
        let path = self.key_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                if let Some(parent) = path.parent() {
                    self.prune_empty_parents(parent);
                }
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound {
                key: key.to_string(),
            }),
            Err(e) => Err(StoreError::io(key, e)),
        }
    }
}
