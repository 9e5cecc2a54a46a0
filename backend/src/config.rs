//! Configuration management for passferry
//!
//! Settings are read from a YAML file and then overridden by command-line
//! flags. Every section has defaults, so a partial file is enough.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{BackendResult, ConfigError};
use passferry_shared::constants::DEFAULT_PREFIX;

/// Log levels accepted in configuration and on the command line
pub const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Where secrets are written
    pub destination: DestinationConfig,

    /// Run behaviour
    pub run: RunConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Destination store kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum DestinationKind {
    /// gopass store driven through the `gopass` binary
    #[default]
    Gopass,

    /// Plain directory tree, one file per secret
    Directory,

    /// KeePass-style entry database file
    Keepass,
}

impl std::fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DestinationKind::Gopass => write!(f, "gopass"),
            DestinationKind::Directory => write!(f, "directory"),
            DestinationKind::Keepass => write!(f, "keepass"),
        }
    }
}

/// Destination store configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DestinationConfig {
    /// Which store to write to
    pub kind: DestinationKind,

    /// Root path segment for every written secret
    pub prefix: String,

    /// gopass executable, looked up on PATH when relative
    pub gopass_binary: PathBuf,

    /// Root directory for the `directory` destination
    pub store_dir: Option<PathBuf>,

    /// YAML entry database for the `keepass` destination; not a KDBX file
    pub database_path: Option<PathBuf>,

    /// How long to wait for the database lock, in seconds
    pub lock_timeout_secs: u64,
}

/// Run behaviour
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct RunConfig {
    /// Compute changes without writing or deleting anything
    pub dry_run: bool,

    /// Log and skip items that fail to map or encode
    pub continue_on_error: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable structured JSON logging
    pub json_format: bool,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            kind: DestinationKind::Gopass,
            prefix: DEFAULT_PREFIX.to_string(),
            gopass_binary: PathBuf::from("gopass"),
            store_dir: None,
            database_path: None,
            lock_timeout_secs: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Config {
    /// Default location: `<config dir>/passferry/config.yml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|mut p| {
                p.push("passferry");
                p.push("config.yml");
                p
            })
            .unwrap_or_else(|| PathBuf::from("passferry.yml"))
    }

    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> BackendResult<Self> {
        let path = path.as_ref();
        debug!("Loading configuration from: {:?}", path);

        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_string_lossy().to_string(),
            }
            .into());
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = fs::metadata(path).map_err(ConfigError::from)?;
            let permissions = metadata.permissions().mode() & 0o777;

            if permissions & 0o044 != 0 {
                warn!(
                    "Configuration file {:?} has overly permissive permissions: {:o}",
                    path, permissions
                );
            }
        }

        let content = fs::read_to_string(path).map_err(ConfigError::from)?;
        let config: Config = serde_yaml::from_str(&content).map_err(ConfigError::from)?;

        info!("Configuration loaded successfully from: {:?}", path);
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a file, readable by the owner only
    pub fn save<P: AsRef<Path>>(&self, path: P) -> BackendResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::from)?;
        }

        let content = serde_yaml::to_string(self).map_err(ConfigError::from)?;
        fs::write(path, content).map_err(ConfigError::from)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(path).map_err(ConfigError::from)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms).map_err(ConfigError::from)?;
        }

        info!("Configuration saved to: {:?}", path);
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> BackendResult<()> {
        let prefix = &self.destination.prefix;
        if prefix.is_empty() {
            return Err(ConfigError::Invalid {
                field: "destination.prefix".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }

        if prefix.starts_with('/') || prefix.ends_with('/') {
            return Err(ConfigError::Invalid {
                field: "destination.prefix".to_string(),
                reason: "must not start or end with '/'".to_string(),
            }
            .into());
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid {
                field: "logging.level".to_string(),
                reason: format!("must be one of: {}", VALID_LOG_LEVELS.join(", ")),
            }
            .into());
        }

        match self.destination.kind {
            DestinationKind::Directory if self.destination.store_dir.is_none() => {
                return Err(ConfigError::Invalid {
                    field: "destination.store_dir".to_string(),
                    reason: "required for the directory destination".to_string(),
                }
                .into());
            }
            DestinationKind::Keepass if self.destination.database_path.is_none() => {
                return Err(ConfigError::Invalid {
                    field: "destination.database_path".to_string(),
                    reason: "required for the keepass destination".to_string(),
                }
                .into());
            }
            _ => {}
        }

        if self.run.dry_run {
            debug!("Dry-run enabled; nothing will be written");
        }

        debug!("Configuration validation passed");
        Ok(())
    }

    /// Database lock timeout as Duration
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.destination.lock_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use assert_matches::assert_matches;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.destination.prefix, "enpass");
        assert_eq!(config.destination.kind, DestinationKind::Gopass);
        assert_eq!(config.lock_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.destination.kind = DestinationKind::Keepass;
        config.destination.database_path = Some(PathBuf::from("/tmp/db.yml"));

        let yaml_str = serde_yaml::to_string(&config).unwrap();
        assert!(yaml_str.contains("kind: keepass"));

        let deserialized: Config = serde_yaml::from_str(&yaml_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = serde_yaml::from_str("run:\n  dry_run: true\n").unwrap();
        assert!(config.run.dry_run);
        assert_eq!(config.destination.prefix, "enpass");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.destination.prefix = String::new();
        assert_matches!(
            config.validate(),
            Err(BackendError::Config(ConfigError::Invalid { .. }))
        );

        config.destination.prefix = "/enpass".to_string();
        assert!(config.validate().is_err());

        config.destination.prefix = "enpass/".to_string();
        assert!(config.validate().is_err());

        config.destination.prefix = "import/enpass".to_string();
        assert!(config.validate().is_ok());

        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
        config.logging.level = "DEBUG".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_destination_requirements() {
        let mut config = Config::default();

        config.destination.kind = DestinationKind::Directory;
        assert!(config.validate().is_err());
        config.destination.store_dir = Some(PathBuf::from("/tmp/store"));
        assert!(config.validate().is_ok());

        config.destination.kind = DestinationKind::Keepass;
        assert!(config.validate().is_err());
        config.destination.database_path = Some(PathBuf::from("/tmp/db.yml"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_operations() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut config = Config::default();
        config.run.continue_on_error = true;

        config.save(temp_file.path()).unwrap();
        let loaded_config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config, loaded_config);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(temp_file.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_missing_and_broken_files() {
        let temp_dir = tempdir().unwrap();

        assert_matches!(
            Config::load(temp_dir.path().join("absent.yml")),
            Err(BackendError::Config(ConfigError::NotFound { .. }))
        );

        let broken = temp_dir.path().join("broken.yml");
        fs::write(&broken, "destination: [not, a, map").unwrap();
        assert_matches!(
            Config::load(&broken),
            Err(BackendError::Config(ConfigError::Parse(_)))
        );
    }
}
