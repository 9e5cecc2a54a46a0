//! Error types for the passferry backend
//!
//! Store, configuration and pipeline errors, with conversions from the
//! shared crate's mapping and encoding errors.

use std::fmt;
use thiserror::Error;

use passferry_shared::error::{EncodeError, MappingError, PathError, SourceError};

/// Main error type for the passferry backend
#[derive(Error, Debug)]
pub enum BackendError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Destination store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Source export could not be read
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Item path could not be derived
    #[error("Path error: {0}")]
    Path(#[from] PathError),

    /// Item fields could not be mapped
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// Fields could not be encoded for the destination
    #[error("Encoding error: {0}")]
    Encode(#[from] EncodeError),

    /// An item failed; carries the item title and attempted path
    #[error("Item '{title}' at '{path}' failed: {source}")]
    Item {
        title: String,
        path: String,
        #[source]
        source: Box<BackendError>,
    },

    /// The run was interrupted
    #[error("Migration cancelled")]
    Cancelled,
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    NotFound { path: String },

    #[error("Invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("Configuration parsing failed: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Configuration I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Destination store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// The key does not exist; adapters treat this as no prior content
    #[error("Secret not found: {key}")]
    NotFound { key: String },

    #[error("Store I/O failed for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Store command `{command}` failed: {reason}")]
    Command { command: String, reason: String },

    #[error("Store operation cancelled")]
    Cancelled,

    #[error("Failed to lock {path}: {reason}")]
    Lock { path: String, reason: String },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },
}

impl StoreError {
    pub fn io<K: Into<String>>(key: K, source: std::io::Error) -> Self {
        StoreError::Io {
            key: key.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Result type alias for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Result type alias for store collaborators
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for converting errors to user-friendly messages
pub trait UserFriendlyError {
    /// One-line reason printed when the run aborts
    fn user_message(&self) -> String;

    /// Error category for logging
    fn category(&self) -> ErrorCategory;
}

/// Error categories for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Source,
    Mapping,
    Storage,
    Cancelled,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Source => write!(f, "source"),
            ErrorCategory::Mapping => write!(f, "mapping"),
            ErrorCategory::Storage => write!(f, "storage"),
            ErrorCategory::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl UserFriendlyError for BackendError {
    fn user_message(&self) -> String {
        match self {
            BackendError::Config(_) => {
                "Configuration error. Please check your settings.".to_string()
            }
            BackendError::Source(SourceError::Io { path, .. }) => {
                format!("Cannot read export file {:?}.", path)
            }
            BackendError::Source(SourceError::Parse { .. }) => {
                "Export file is not a valid Enpass JSON export.".to_string()
            }
            BackendError::Store(StoreError::Command { command, .. }) => {
                format!("Store command `{}` failed. Is gopass installed and initialized?", command)
            }
            BackendError::Store(StoreError::Lock { path, .. }) => {
                format!("Database {} is in use by another process.", path)
            }
            BackendError::Store(_) => "Destination store operation failed.".to_string(),
            BackendError::Path(e) => format!("Cannot derive a path: {}", e),
            BackendError::Mapping(e) => format!("Cannot map item: {}", e),
            BackendError::Encode(e) => format!("Cannot encode item: {}", e),
            BackendError::Item { title, source, .. } => {
                format!("Item '{}': {}", title, source.user_message())
            }
            BackendError::Cancelled | BackendError::Store(StoreError::Cancelled) => {
                "Migration was interrupted; run it again to resume.".to_string()
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            BackendError::Config(_) => ErrorCategory::Configuration,
            BackendError::Source(_) => ErrorCategory::Source,
            BackendError::Path(_) | BackendError::Mapping(_) | BackendError::Encode(_) => {
                ErrorCategory::Mapping
            }
            BackendError::Store(StoreError::Cancelled) | BackendError::Cancelled => {
                ErrorCategory::Cancelled
            }
            BackendError::Store(_) => ErrorCategory::Storage,
            BackendError::Item { source, .. } => source.category(),
        }
    }
}

impl BackendError {
    /// Attach item context to an error
    pub fn for_item<T: Into<String>, P: Into<String>>(self, title: T, path: P) -> Self {
        BackendError::Item {
            title: title.into(),
            path: path.into(),
            source: Box::new(self),
        }
    }

    /// Whether the error comes from the destination store
    pub fn is_store_error(&self) -> bool {
        match self {
            BackendError::Store(_) => true,
            BackendError::Item { source, .. } => source.is_store_error(),
            _ => false,
        }
    }

    /// Whether the error stems from a cancellation request
    pub fn is_cancelled(&self) -> bool {
        match self {
            BackendError::Cancelled | BackendError::Store(StoreError::Cancelled) => true,
            BackendError::Item { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = BackendError::Store(StoreError::NotFound {
            key: "enpass/a/data".to_string(),
        });
        assert!(error.to_string().contains("enpass/a/data"));
    }

    #[test]
    fn test_user_friendly_message() {
        let error = BackendError::Store(StoreError::Command {
            command: "gopass ls".to_string(),
            reason: "exit status 1".to_string(),
        });
        let message = error.user_message();
        assert!(message.contains("gopass"));
        assert!(!message.contains("exit status"));
    }

    #[test]
    fn test_error_category() {
        let error: BackendError = PathError::EmptyCategory {
            title: "Bank".to_string(),
        }
        .into();
        assert_eq!(error.category(), ErrorCategory::Mapping);

        let wrapped = error.for_item("Bank", "finance/bank");
        assert_eq!(wrapped.category(), ErrorCategory::Mapping);
        assert!(wrapped.to_string().contains("finance/bank"));
        assert!(!wrapped.is_store_error());
    }

    #[test]
    fn test_store_errors_through_item_context() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = BackendError::from(StoreError::io("enpass/a/data", io_error))
            .for_item("A", "a");

        assert!(error.is_store_error());
        assert_eq!(error.category(), ErrorCategory::Storage);
    }
}
