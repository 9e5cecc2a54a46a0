//! passferry backend library
//!
//! Configuration, destination stores and the migration pipeline behind the
//! `passferry` binary, exposed as a library for tests.

pub mod cancel;
pub mod config;
pub mod error;
pub mod migrate;
pub mod storage;

// Re-export commonly used types
pub use cancel::CancelToken;
pub use config::{Config, DestinationKind};
pub use error::{BackendError, BackendResult, ErrorCategory, UserFriendlyError};
pub use migrate::{migrate_file, MigrationReport, Migrator};
pub use storage::{open_destination, Destination, SecretBackend};
