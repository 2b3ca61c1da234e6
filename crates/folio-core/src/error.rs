//! Error types for folio-core

use thiserror::Error;

use crate::models::{ConflictId, NotebookId};

/// Result type alias using folio-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in folio-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Notebook, session or conflict not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unknown or unusable resolution strategy
    #[error("Invalid resolution strategy: {0}")]
    InvalidStrategy(String),

    /// Conflict was already resolved
    #[error("Conflict already resolved: {0}")]
    AlreadyResolved(ConflictId),

    /// Timed out waiting for the notebook write lock
    #[error("Timed out waiting for write lock on notebook {0}")]
    LockTimeout(NotebookId),

    /// Invalid engine configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the whole operation can safely be retried.
    ///
    /// Every write runs in a single transaction, so a lock-wait failure never
    /// leaves partial state behind.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::LockTimeout(_) => true,
            Self::Sqlite(rusqlite::Error::SqliteFailure(failure, _)) => matches!(
                failure.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}
