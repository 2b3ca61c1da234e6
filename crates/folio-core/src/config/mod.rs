//! Sync engine configuration.
//!
//! Values come from `FOLIO_*` environment variables with sensible defaults;
//! `from_lookup` takes any key lookup so tests never touch the process env.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::models::Role;

const DEFAULT_DATABASE_PATH: &str = "folio.db";
const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MAX_PATCH_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for crate::error::Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Runtime settings for the sync engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// `SQLite` database file
    pub database_path: PathBuf,
    /// How long a writer waits for a notebook's lock
    pub lock_timeout: Duration,
    /// How long `SQLite` waits on a locked database file
    pub busy_timeout: Duration,
    /// Largest accepted patch, in bytes
    pub max_patch_bytes: usize,
    /// Roles whose edits win over conflicting concurrent edits
    pub elevated_roles: Vec<Role>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            max_patch_bytes: DEFAULT_MAX_PATCH_BYTES,
            elevated_roles: vec![Role::Owner, Role::Admin],
        }
    }
}

impl EngineConfig {
    /// Default settings for a database at `path`
    pub fn with_database_path(path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: path.into(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_path =
            PathBuf::from(value_or_default(&lookup, "FOLIO_DATABASE_PATH", DEFAULT_DATABASE_PATH));

        let lock_timeout_ms = parse_in_range(
            &lookup,
            "FOLIO_LOCK_TIMEOUT_MS",
            DEFAULT_LOCK_TIMEOUT_MS,
            10..=60_000,
        )?;
        let busy_timeout_ms = parse_in_range(
            &lookup,
            "FOLIO_BUSY_TIMEOUT_MS",
            DEFAULT_BUSY_TIMEOUT_MS,
            0..=60_000,
        )?;
        let max_patch_bytes = parse_in_range(
            &lookup,
            "FOLIO_MAX_PATCH_BYTES",
            DEFAULT_MAX_PATCH_BYTES as u64,
            1..=16 * 1024 * 1024,
        )?;

        let elevated_roles = match optional_trimmed(&lookup, "FOLIO_ELEVATED_ROLES") {
            Some(list) => parse_roles(&list)?,
            None => vec![Role::Owner, Role::Admin],
        };

        Ok(Self {
            database_path,
            lock_timeout: Duration::from_millis(lock_timeout_ms),
            busy_timeout: Duration::from_millis(busy_timeout_ms),
            max_patch_bytes: usize::try_from(max_patch_bytes).map_err(|_| {
                ConfigError::Invalid("FOLIO_MAX_PATCH_BYTES does not fit in memory".to_string())
            })?,
            elevated_roles,
        })
    }

    /// Whether `role` may override conflicting concurrent edits
    pub fn is_elevated(&self, role: Role) -> bool {
        self.elevated_roles.contains(&role)
    }
}

fn parse_roles(list: &str) -> Result<Vec<Role>, ConfigError> {
    let roles = list
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<Role>().map_err(|_| {
                ConfigError::Invalid(format!("FOLIO_ELEVATED_ROLES has unknown role {part:?}"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if roles.is_empty() {
        return Err(ConfigError::Invalid(
            "FOLIO_ELEVATED_ROLES must name at least one role".to_string(),
        ));
    }
    Ok(roles)
}

fn parse_in_range(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u64,
    range: std::ops::RangeInclusive<u64>,
) -> Result<u64, ConfigError> {
    let Some(raw) = optional_trimmed(lookup, name) else {
        return Ok(default);
    };
    let invalid = || {
        ConfigError::Invalid(format!(
            "{name} must be an integer in [{}, {}]",
            range.start(),
            range.end()
        ))
    };
    let value = raw.parse::<u64>().map_err(|_| invalid())?;
    if !range.contains(&value) {
        return Err(invalid());
    }
    Ok(value)
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
