//! Run-scoped path uniqueness registry
//!
//! Hands out collision-free destination paths and remembers which final
//! paths were written during a run, so cleanup can tell live entries from
//! stale ones. Keys are SHA-256 digests of the exact path strings.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

use crate::utils::hash::sha256_hex;

#[derive(Debug, Default)]
struct RegistryState {
    /// Occurrence count per original (pre-suffix) path digest
    counts: HashMap<String, u64>,

    /// Digests of final paths touched this run
    marked: HashSet<String>,
}

/// Deduplicates destination paths for one migration run
#[derive(Debug, Default)]
pub struct PathRegistry {
    state: Mutex<RegistryState>,
}

impl PathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        // Every update is a single insert, so a poisoned map is still consistent
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Unique form of `path` given the registrations so far
    ///
    /// Returns `path` itself when it was never registered, otherwise
    /// `path_{count+1}`.
    pub fn resolve(&self, path: &str) -> String {
        let state = self.state();
        Self::resolve_locked(&state, path)
    }

    fn resolve_locked(state: &RegistryState, path: &str) -> String {
        match state.counts.get(&sha256_hex(path)) {
            Some(count) if *count > 0 => format!("{}_{}", path, count + 1),
            _ => path.to_string(),
        }
    }

    /// Count one more occurrence of the original path
    pub fn register(&self, path: &str) {
        let mut state = self.state();
        *state.counts.entry(sha256_hex(path)).or_insert(0) += 1;
    }

    /// Record a final path as written during this run
    pub fn mark(&self, path: &str) {
        let mut state = self.state();
        state.marked.insert(sha256_hex(path));
    }

    /// Whether the final path was marked during this run
    pub fn has(&self, path: &str) -> bool {
        let state = self.state();
        state.marked.contains(&sha256_hex(path))
    }

    /// Resolve, register and mark in one step
    ///
    /// This is what adapters call for every item path and key; a renamed
    /// path is logged at WARN.
    pub fn allocate(&self, path: &str) -> String {
        let mut state = self.state();
        let unique = Self::resolve_locked(&state, path);
        *state.counts.entry(sha256_hex(path)).or_insert(0) += 1;
        state.marked.insert(sha256_hex(&unique));
        drop(state);

        if unique != path {
            warn!("path will be renamed: {:?} -> {:?}", path, unique);
        }
        unique
    }
}
