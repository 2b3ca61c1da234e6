//! Database migrations

use crate::error::Result;
use rusqlite::{Connection, TransactionBehavior};

/// Current schema version
const CURRENT_VERSION: i32 = 3;

/// Run all pending migrations
///
/// Runs in one immediate transaction so concurrent openers of the same file
/// cannot both apply a step.
pub fn run(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let version = get_version(&tx)?;

    if version < 1 {
        migrate_v1(&tx)?;
    }
    if version < 2 {
        migrate_v2(&tx)?;
    }
    if version < 3 {
        migrate_v3(&tx)?;
    }

    tx.commit()?;
    if version < CURRENT_VERSION {
        tracing::info!("Migrated database from version {version} to {CURRENT_VERSION}");
    }
    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Migration to version 1: notebooks and their version history
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS notebooks (
            id TEXT PRIMARY KEY,
            workspace_id TEXT NOT NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            version INTEGER NOT NULL CHECK (version >= 1),
            created_by TEXT NOT NULL,
            last_modified_by TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_notebooks_workspace ON notebooks(workspace_id);

        CREATE TABLE IF NOT EXISTS notebook_versions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            notebook_id TEXT NOT NULL REFERENCES notebooks(id) ON DELETE CASCADE,
            version_number INTEGER NOT NULL,
            content TEXT NOT NULL,
            created_by TEXT,
            change_summary TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL,
            UNIQUE (notebook_id, version_number)
        );

        -- History is append-only
        CREATE TRIGGER IF NOT EXISTS notebook_versions_append_only
        BEFORE UPDATE ON notebook_versions
        BEGIN
            SELECT RAISE(ABORT, 'notebook history is append-only');
        END;

        INSERT INTO schema_version (version) VALUES (1);",
    )?;
    Ok(())
}

/// Migration to version 2: editing sessions
fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS editing_sessions (
            token TEXT PRIMARY KEY,
            notebook_id TEXT NOT NULL REFERENCES notebooks(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            base_version INTEGER NOT NULL,
            base_content TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            started_at INTEGER NOT NULL,
            last_activity INTEGER NOT NULL
        );

        -- At most one active session per (notebook, user)
        CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_one_active
            ON editing_sessions(notebook_id, user_id) WHERE is_active = 1;

        INSERT INTO schema_version (version) VALUES (2);",
    )?;
    Ok(())
}

/// Migration to version 3: merge conflicts
fn migrate_v3(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS notebook_conflicts (
            id TEXT PRIMARY KEY,
            notebook_id TEXT NOT NULL REFERENCES notebooks(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            server_version INTEGER NOT NULL,
            client_version INTEGER NOT NULL,
            base_content TEXT NOT NULL,
            your_content TEXT NOT NULL,
            their_content TEXT NOT NULL,
            resolved_content TEXT NOT NULL DEFAULT '',
            conflict_blocks TEXT NOT NULL DEFAULT '[]',
            resolution_strategy TEXT NOT NULL DEFAULT 'PENDING',
            resolved_by TEXT,
            resolved_at INTEGER,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_conflicts_pending
            ON notebook_conflicts(notebook_id, resolution_strategy);
        CREATE INDEX IF NOT EXISTS idx_conflicts_created
            ON notebook_conflicts(created_at DESC);

        -- A resolved conflict never changes again
        CREATE TRIGGER IF NOT EXISTS notebook_conflicts_resolved_once
        BEFORE UPDATE ON notebook_conflicts
        FOR EACH ROW
        WHEN OLD.resolution_strategy != 'PENDING'
        BEGIN
            SELECT RAISE(ABORT, 'conflict already resolved');
        END;

        INSERT INTO schema_version (version) VALUES (3);",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_reach_current_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();
        assert_eq!(get_version(&conn).unwrap(), CURRENT_VERSION);

        // Running again is a no-op
        run(&mut conn).unwrap();
        assert_eq!(get_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_history_rows_cannot_be_rewritten() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();
        conn.execute_batch(
            "INSERT INTO notebooks VALUES ('n1', 'w1', 't', 'c', 1, 'u', NULL, 0, 0);
             INSERT INTO notebook_versions (notebook_id, version_number, content, created_at)
                 VALUES ('n1', 1, 'c', 0);",
        )
        .unwrap();

        let result = conn.execute(
            "UPDATE notebook_versions SET content = 'changed' WHERE notebook_id = 'n1'",
            [],
        );
        assert!(result.is_err());
    }
}
