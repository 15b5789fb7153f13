//! Runtime configuration
//!
//! `AppConfig` is resolved once at startup from environment variables, with
//! defaults for anything unset. Command-line flags override individual fields
//! afterwards.
//!
//! | Variable                   | Default                            |
//! |----------------------------|------------------------------------|
//! | `SYLLABUS_DB_PATH`         | `~/.syllabus/database/syllabus.db` |
//! | `SYLLABUS_TREE`            | `question-bank`                    |
//! | `SYLLABUS_REORDER_RETRIES` | `3` (at most 10)                   |

use crate::models::{TreeInstance, ValidationError};
use crate::operations::{DEFAULT_REORDER_RETRIES, MAX_REORDER_RETRIES};
use std::path::PathBuf;
use thiserror::Error;

pub const DB_PATH_ENV: &str = "SYLLABUS_DB_PATH";
pub const TREE_ENV: &str = "SYLLABUS_TREE";
pub const REORDER_RETRIES_ENV: &str = "SYLLABUS_REORDER_RETRIES";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to get home directory")]
    NoHomeDirectory,

    #[error("Invalid {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

impl From<ValidationError> for ConfigError {
    fn from(err: ValidationError) -> Self {
        Self::InvalidValue {
            name: TREE_ENV,
            reason: err.to_string(),
        }
    }
}

/// Runtime configuration, immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// libsql database file shared by all tree instances
    pub database_path: PathBuf,

    /// Tree instance used when a command does not name one
    pub default_tree: TreeInstance,

    /// Retries for reorder batches that hit a store failure
    pub reorder_retries: usize,
}

/// `~/.syllabus/database/syllabus.db`
pub fn default_database_path() -> Result<PathBuf, ConfigError> {
    let home_dir = dirs::home_dir().ok_or(ConfigError::NoHomeDirectory)?;
    Ok(home_dir
        .join(".syllabus")
        .join("database")
        .join("syllabus.db"))
}

impl AppConfig {
    /// Resolve from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_path = match lookup(DB_PATH_ENV).filter(|p| !p.trim().is_empty()) {
            Some(path) => {
                tracing::info!("Using database path from {}: {}", DB_PATH_ENV, path);
                PathBuf::from(path)
            }
            None => default_database_path()?,
        };

        let default_tree = match lookup(TREE_ENV) {
            Some(value) => value.parse()?,
            None => TreeInstance::QuestionBank,
        };

        let reorder_retries = match lookup(REORDER_RETRIES_ENV) {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                    name: REORDER_RETRIES_ENV,
                    reason: e.to_string(),
                })?,
            None => DEFAULT_REORDER_RETRIES,
        };
        if reorder_retries > MAX_REORDER_RETRIES {
            return Err(ConfigError::InvalidValue {
                name: REORDER_RETRIES_ENV,
                reason: format!(
                    "{} exceeds the maximum of {}",
                    reorder_retries, MAX_REORDER_RETRIES
                ),
            });
        }

        Ok(Self {
            database_path,
            default_tree,
            reorder_retries,
        })
    }
}
