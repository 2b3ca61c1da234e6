//! Database connection management

use crate::error::Result;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

use super::migrations;

/// Database wrapper for a single `SQLite` connection
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open a database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let mut database = Self::connect(path, busy_timeout)?;
        database.migrate()?;
        Ok(database)
    }

    /// Open another connection to an already-migrated database
    pub fn connect(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)?;
        let database = Self { conn };
        database.configure(busy_timeout)?;
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut database = Self { conn };
        database.configure(Duration::ZERO)?;
        database.migrate()?;
        Ok(database)
    }

    /// Configure `SQLite` for concurrent writers
    fn configure(&self, busy_timeout: Duration) -> Result<()> {
        // In-memory databases answer "memory" here, which is fine
        let mode: String =
            self.conn
                .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::trace!("SQLite journal mode: {mode}");
        self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        self.conn.busy_timeout(busy_timeout)?;
        Ok(())
    }

    /// Run database migrations
    fn migrate(&mut self) -> Result<()> {
        migrations::run(&mut self.conn)
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Begin a write transaction, taking the database write lock up front
    ///
    /// Waits up to the busy timeout for other writers; on expiry the error is
    /// retryable and nothing has been written.
    pub fn write_transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    /// Begin a read-only snapshot transaction
    pub fn read_transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Deferred)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        let tables: i64 = db
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name LIKE 'notebook%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
    }

    #[test]
    fn test_file_database_uses_wal() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("folio.db");
        let db = Database::open(&path, Duration::from_millis(100)).unwrap();

        let mode: String = db
            .connection()
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_reopen_is_idempotent() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("folio.db");
        drop(Database::open(&path, Duration::from_millis(100)).unwrap());
        let db = Database::open(&path, Duration::from_millis(100)).unwrap();

        let version: i32 = db
            .connection()
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 3);
    }

    #[test]
    fn test_write_transaction_waits_then_reports_busy() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("folio.db");
        let mut first = Database::open(&path, Duration::from_millis(50)).unwrap();
        let mut second = Database::connect(&path, Duration::from_millis(50)).unwrap();

        let _held = first.write_transaction().unwrap();
        let err = second.write_transaction().unwrap_err();
        assert!(err.is_retryable());
    }
}
