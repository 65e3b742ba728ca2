//! Host configuration for CloudNote core.
//!
//! # Responsibility
//! - Load logging and store settings from defaults, TOML and environment.
//! - Reject unusable settings before any subsystem starts.
//!
//! # Invariants
//! - Precedence (highest first): `CLOUDNOTE_*` env vars, TOML file, defaults.
//! - A validated config always names a usable store backend.

use crate::logging::{default_log_level, normalize_level};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Env var prefix; nested keys use `__`, e.g. `CLOUDNOTE_STORE__BACKEND`.
const ENV_PREFIX: &str = "CLOUDNOTE_";

/// Configuration load/validation failure.
#[derive(Debug)]
pub enum ConfigError {
    Load(Box<figment::Error>),
    Validation(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Load(err) => write!(f, "failed to load configuration: {err}"),
            Self::Validation(message) => write!(f, "invalid configuration: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Load(err) => Some(err.as_ref()),
            Self::Validation(_) => None,
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(value: figment::Error) -> Self {
        Self::Load(Box::new(value))
    }
}

/// Record store backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Ephemeral in-process store.
    #[default]
    Memory,
    /// SQLite file at `store.database_path`.
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of `trace|debug|info|warn|error`.
    pub level: String,
    /// Absolute directory for rolling log files; logging stays off when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database_path: Option<PathBuf>,
}

/// Complete host configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub logging: LoggingConfig,
    pub store: StoreConfig,
}

impl CoreConfig {
    /// Loads defaults, then `config_file` when given, then env overrides.
    ///
    /// # Errors
    /// - `ConfigError::Load` when a source cannot be parsed.
    /// - `ConfigError::Validation` when the merged values are unusable.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(CoreConfig::default()));
        if let Some(path) = config_file {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: CoreConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        normalize_level(&self.logging.level).map_err(ConfigError::Validation)?;

        if let Some(dir) = &self.logging.dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Validation(format!(
                    "logging.dir must be an absolute path, got `{}`",
                    dir.display()
                )));
            }
        }

        if self.store.backend == StoreBackend::Sqlite && self.store.database_path.is_none() {
            return Err(ConfigError::Validation(
                "store.database_path is required for the sqlite backend".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, StoreBackend};
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn default_config_is_valid_memory_backend() {
        let config = CoreConfig::default();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert!(config.logging.dir.is_none());
        config.validate().expect("defaults should validate");
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[logging]\nlevel = \"warn\"\n\n[store]\nbackend = \"sqlite\"\ndatabase_path = \"/tmp/cloudnote.sqlite3\""
        )
        .unwrap();

        let config = CoreConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(
            config.store.database_path,
            Some(PathBuf::from("/tmp/cloudnote.sqlite3"))
        );
    }

    #[test]
    fn sqlite_backend_requires_database_path() {
        let mut config = CoreConfig::default();
        config.store.backend = StoreBackend::Sqlite;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(message) if message.contains("database_path")));
    }

    #[test]
    fn rejects_unknown_level_and_relative_log_dir() {
        let mut config = CoreConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = CoreConfig::default();
        config.logging.dir = Some(PathBuf::from("logs/dev"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("absolute"));
    }
}
