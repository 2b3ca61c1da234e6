//! Database layer for Folio

mod conflict_repository;
mod connection;
mod migrations;
mod repository;
mod session_repository;
mod version_repository;

pub use conflict_repository::{ConflictRepository, SqliteConflictRepository};
pub use connection::Database;
pub use repository::{NotebookRepository, SqliteNotebookRepository};
pub use session_repository::{SessionRepository, SqliteSessionRepository};
pub use version_repository::{SqliteVersionRepository, VersionRepository};

use std::str::FromStr;

/// Read a text column and parse it into a typed value
fn parse_column<T>(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(index)?;
    raw.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}
