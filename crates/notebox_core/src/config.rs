//! Runtime configuration for the note store.
//!
//! # Responsibility
//! - Provide defaults for database location, logging and write retries.
//! - Apply `NOTEBOX_*` environment overrides.
//!
//! # Invariants
//! - `max_write_attempts` is always >= 1.
//! - Blank environment values are treated as unset.

use crate::kv::{KvResult, SqliteKvStore};
use crate::logging::{default_log_level, LogLevel};
use crate::service::note_store::{NoteStore, DEFAULT_MAX_WRITE_ATTEMPTS};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "NOTEBOX_DB_PATH";
pub const LOG_LEVEL_ENV: &str = "NOTEBOX_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "NOTEBOX_LOG_DIR";
pub const MAX_WRITE_ATTEMPTS_ENV: &str = "NOTEBOX_MAX_WRITE_ATTEMPTS";

const DEFAULT_DB_FILE_NAME: &str = "notebox.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue {
                name,
                value,
                reason,
            } => write!(f, "invalid value `{value}` for {name}: {reason}"),
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    pub log_level: LogLevel,
    /// File logging is skipped when unset.
    pub log_dir: Option<PathBuf>,
    pub max_write_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
            log_level: default_log_level(),
            log_dir: None,
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
        }
    }
}

impl StoreConfig {
    /// Defaults overridden by process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by values returned from `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(path) = read(DB_PATH_ENV) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(level) = read(LOG_LEVEL_ENV) {
            config.log_level = LogLevel::parse(&level).map_err(|reason| {
                ConfigError::InvalidValue {
                    name: LOG_LEVEL_ENV,
                    value: level.clone(),
                    reason,
                }
            })?;
        }
        if let Some(dir) = read(LOG_DIR_ENV) {
            config.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = read(MAX_WRITE_ATTEMPTS_ENV) {
            config.max_write_attempts = match raw.parse::<u32>() {
                Ok(value) if value >= 1 => value,
                Ok(_) => {
                    return Err(ConfigError::InvalidValue {
                        name: MAX_WRITE_ATTEMPTS_ENV,
                        value: raw,
                        reason: "must be at least 1".to_string(),
                    })
                }
                Err(err) => {
                    return Err(ConfigError::InvalidValue {
                        name: MAX_WRITE_ATTEMPTS_ENV,
                        value: raw,
                        reason: err.to_string(),
                    })
                }
            };
        }

        Ok(config)
    }

    /// Opens the configured database and wraps it in an empty `NoteStore`.
    pub fn open_store(&self) -> KvResult<NoteStore<SqliteKvStore>> {
        let kv = SqliteKvStore::open(&self.db_path)?;
        Ok(NoteStore::new(kv).with_max_write_attempts(self.max_write_attempts))
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, StoreConfig, DB_PATH_ENV, LOG_LEVEL_ENV, MAX_WRITE_ATTEMPTS_ENV};
    use crate::logging::LogLevel;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = StoreConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.max_write_attempts, 3);
    }

    #[test]
    fn overrides_are_applied_and_blank_values_ignored() {
        let config = StoreConfig::from_lookup(lookup(&[
            (DB_PATH_ENV, " /data/notes.sqlite3 "),
            (LOG_LEVEL_ENV, "WARN"),
            (MAX_WRITE_ATTEMPTS_ENV, "  "),
        ]))
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/data/notes.sqlite3"));
        assert_eq!(config.log_level, LogLevel::Warn);
        assert_eq!(config.max_write_attempts, 3);
    }

    #[test]
    fn rejects_zero_and_non_numeric_attempts() {
        for raw in ["0", "many"] {
            let err = StoreConfig::from_lookup(lookup(&[(MAX_WRITE_ATTEMPTS_ENV, raw)]))
                .unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue { name, .. } if name == MAX_WRITE_ATTEMPTS_ENV
            ));
        }
    }

    #[test]
    fn rejects_unknown_log_level() {
        let err = StoreConfig::from_lookup(lookup(&[(LOG_LEVEL_ENV, "loud")])).unwrap_err();
        assert!(err.to_string().contains(LOG_LEVEL_ENV));
    }
}
