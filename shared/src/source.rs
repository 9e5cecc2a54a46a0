//! Source export loading
//!
//! The pipeline reads items through [`SecretSource`] so that other export
//! formats can be added next to the Enpass JSON reader.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::SourceError;
use crate::models::{ExportData, FoldersMap, SourceItem};

/// Read-only access to an export
pub trait SecretSource {
    /// All items of the export, in file order
    fn load_items(&self) -> &[SourceItem];

    /// Folder table of the export
    fn folders_map(&self) -> &FoldersMap;
}

/// Enpass JSON export, parsed once when opened
#[derive(Debug, Clone)]
pub struct EnpassJsonSource {
    path: PathBuf,
    data: ExportData,
    folders: FoldersMap,
}

impl EnpassJsonSource {
    /// Read and parse an export file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let path = fs::canonicalize(path).map_err(|e| SourceError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        info!("Loading Enpass export from {:?}", path);
        let content = fs::read(&path).map_err(|e| SourceError::Io {
            path: path.clone(),
            source: e,
        })?;

        let source = Self::from_slice(&content).map_err(|e| match e {
            SourceError::Parse { reason, .. } => SourceError::Parse {
                path: path.clone(),
                reason,
            },
            other => other,
        })?;

        Ok(Self { path, ..source })
    }

    /// Parse an export already held in memory
    pub fn from_slice(content: &[u8]) -> Result<Self, SourceError> {
        let data: ExportData = serde_json::from_slice(content).map_err(|e| SourceError::Parse {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;
        let folders = data.folders_map();

        debug!(
            "Parsed export with {} items and {} folders",
            data.items.len(),
            folders.len()
        );

        Ok(Self {
            path: PathBuf::new(),
            data,
            folders,
        })
    }

    /// Location of the export on disk; empty for in-memory sources
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn item_count(&self) -> usize {
        self.data.items.len()
    }
}

impl SecretSource for EnpassJsonSource {
    fn load_items(&self) -> &[SourceItem] {
        &self.data.items
    }

    fn folders_map(&self) -> &FoldersMap {
        &self.folders
    }
}
