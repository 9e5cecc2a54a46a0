//! passferry shared library
//!
//! This crate contains the store-independent half of passferry: the
//! canonical field model, the Enpass export loader, path normalization and
//! derivation, the run-scoped path registry and the destination encoders.
//!
//! # Features
//!
//! - **Models**: canonical fields and the source export structures
//! - **Mapping**: source item to canonical fields plus a relative path
//! - **Registry**: deterministic `_2`, `_3` suffixing of colliding paths
//! - **Encoding**: key-value bundles and KeePass-style entries
//!
//! # Usage
//!
//! ```rust
//! use passferry_shared::models::{FoldersMap, SourceItem};
//! use passferry_shared::mapping::{derive_path, map_item};
//! use passferry_shared::encoding::BundleEncoder;
//!
//! let item = SourceItem {
//!     title: "Bank".to_string(),
//!     category: "Finance".to_string(),
//!     ..Default::default()
//! };
//! let folders = FoldersMap::default();
//!
//! let fields = map_item(&item, &folders).unwrap();
//! assert_eq!(derive_path(&item, &folders).unwrap(), "finance/bank");
//!
//! let encoded = BundleEncoder::encode(&fields).unwrap();
//! assert!(encoded.attachments.is_empty());
//! ```

pub mod encoding;
pub mod mapping;
pub mod models;
pub mod registry;
pub mod source;
pub mod utils;

// Re-export commonly used types for convenience
pub use encoding::{Bundle, BundleEncoder, EncodedSecret, KeepassEncoder, KeepassEntry};
pub use mapping::{derive_path, map_item};
pub use models::{
    CanonicalField, ExportData, FieldKind, FoldersMap, SourceAttachment, SourceField,
    SourceFolder, SourceItem,
};
pub use registry::PathRegistry;
pub use source::{EnpassJsonSource, SecretSource};
pub use utils::normalize;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error types used throughout the library
pub mod error {
    use std::path::PathBuf;
    use thiserror::Error;

    /// Errors deriving a destination path from a source item
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum PathError {
        #[error("Item '{title}' has an empty category after normalization")]
        EmptyCategory { title: String },

        #[error("Item in category '{category}' has an empty title after normalization")]
        EmptyTitle { category: String },
    }

    /// Errors converting a source item into canonical fields
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum MappingError {
        #[error("Failed to decode attachment '{name}': {reason}")]
        AttachmentDecode { name: String, reason: String },
    }

    /// Errors rendering canonical fields into a destination encoding
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum EncodeError {
        #[error("Field '{key}' has invalid kind '{kind}' for this encoding")]
        InvalidFieldKind { key: String, kind: String },

        #[error("Malformed secret bundle: {reason}")]
        MalformedBundle { reason: String },
    }

    /// Errors reading a source export
    #[derive(Error, Debug)]
    pub enum SourceError {
        #[error("Failed to read source file {path:?}: {source}")]
        Io {
            path: PathBuf,
            #[source]
            source: std::io::Error,
        },

        #[error("Failed to parse source file {path:?}: {reason}")]
        Parse { path: PathBuf, reason: String },
    }
}

pub use error::{EncodeError, MappingError, PathError, SourceError};

/// Library constants
pub mod constants {
    /// Prefix used when none is configured
    pub const DEFAULT_PREFIX: &str = "enpass";

    /// Leaf name of the primary secret under an item path
    pub const PRIMARY_LEAF: &str = "data";

    /// Directory holding attachment secrets under an item path
    pub const ATTACHMENTS_DIR: &str = "attachments";

    /// Path segments for item states, in priority order
    pub const STATE_TRASH: &str = "trash";
    pub const STATE_ARCHIVE: &str = "archive";
    pub const STATE_FAVORITE: &str = "favorite";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_version() {
        assert!(VERSION.starts_with(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_error_messages() {
        let err = PathError::EmptyTitle {
            category: "login".to_string(),
        };
        assert!(err.to_string().contains("empty title"));

        let err = EncodeError::InvalidFieldKind {
            key: "id.png".to_string(),
            kind: "attachment".to_string(),
        };
        assert!(err.to_string().contains("id.png"));
    }
}
