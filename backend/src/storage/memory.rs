//! In-process secret backend
//!
//! Clones share the same map, so a test can hand one clone to an adapter
//! and inspect the store through another.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::SecretBackend;
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Default)]
struct MemoryState {
    entries: BTreeMap<String, Vec<u8>>,
    writes: usize,
    fail_writes: bool,
}

/// [`SecretBackend`] backed by a shared ordered map
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed a key without counting it as a write
    pub fn insert(&self, key: &str, data: &[u8]) {
        self.state().entries.insert(key.to_string(), data.to_vec());
    }

    pub fn content(&self, key: &str) -> Option<Vec<u8>> {
        self.state().entries.get(key).cloned()
    }

    /// All keys in sorted order
    pub fn keys(&self) -> Vec<String> {
        self.state().entries.keys().cloned().collect()
    }

    /// Number of `set` calls that reached the map
    pub fn write_count(&self) -> usize {
        self.state().writes
    }

    /// Make every later `set` and `remove` fail with an I/O error
    pub fn fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    fn write_error(key: &str) -> StoreError {
        StoreError::io(
            key,
            std::io::Error::new(std::io::ErrorKind::Other, "memory backend write failure"),
        )
    }
}

impl SecretBackend for MemoryBackend {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.content(key))
    }

    fn set(&mut self, key: &str, data: &[u8]) -> StoreResult<()> {
        let mut state = self.state();
        if state.fail_writes {
            return Err(Self::write_error(key));
        }
        state.entries.insert(key.to_string(), data.to_vec());
        state.writes += 1;
        Ok(())
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .state()
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn remove(&mut self, key: &str) -> StoreResult<()> {
        let mut state = self.state();
        if state.fail_writes {
            return Err(Self::write_error(key));
        }
        match state.entries.remove(key) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound {
                key: key.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_shared_state_between_clones() {
        let backend = MemoryBackend::new();
        let mut writer = backend.clone();

        writer.set("enpass/a/data", b"one").unwrap();
        assert_eq!(backend.content("enpass/a/data"), Some(b"one".to_vec()));
        assert_eq!(backend.write_count(), 1);
    }

    #[test]
    fn test_list_by_prefix() {
        let backend = MemoryBackend::new();
        backend.insert("enpass/a/data", b"1");
        backend.insert("enpass/b/data", b"2");
        backend.insert("enpassx/c/data", b"3");

        assert_eq!(
            backend.list("enpass/").unwrap(),
            vec!["enpass/a/data".to_string(), "enpass/b/data".to_string()]
        );
    }

    #[test]
    fn test_missing_keys() {
        let mut backend = MemoryBackend::new();
        assert_eq!(backend.get("nope").unwrap(), None);
        assert_matches!(backend.remove("nope"), Err(StoreError::NotFound { .. }));
    }
}
