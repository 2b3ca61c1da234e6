//! Version history repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use crate::error::Result;
use crate::models::{NotebookId, UserId, VersionEntry};
use rusqlite::{params, Connection};

use super::parse_column;

/// Trait for append-only version history storage
pub trait VersionRepository {
    /// Append a history entry; fails if the version number already exists
    fn append(&self, entry: &VersionEntry) -> Result<()>;

    /// Get the entry for one version
    fn get(&self, notebook_id: NotebookId, version: i64) -> Result<Option<VersionEntry>>;

    /// List a notebook's history, newest first
    fn list(&self, notebook_id: NotebookId, limit: usize) -> Result<Vec<VersionEntry>>;
}

/// `SQLite` implementation of `VersionRepository`
pub struct SqliteVersionRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteVersionRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<VersionEntry> {
        Ok(VersionEntry {
            notebook_id: parse_column(row, 0)?,
            version_number: row.get(1)?,
            content: row.get(2)?,
            created_by: row.get::<_, Option<String>>(3)?.map(UserId::from),
            change_summary: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

impl VersionRepository for SqliteVersionRepository<'_> {
    fn append(&self, entry: &VersionEntry) -> Result<()> {
        self.conn.execute(
            "INSERT INTO notebook_versions
                 (notebook_id, version_number, content, created_by, change_summary, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                entry.notebook_id.as_str(),
                entry.version_number,
                entry.content,
                entry.created_by.as_ref().map(UserId::as_str),
                entry.change_summary,
                entry.created_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, notebook_id: NotebookId, version: i64) -> Result<Option<VersionEntry>> {
        let result = self.conn.query_row(
            "SELECT notebook_id, version_number, content, created_by, change_summary, created_at
             FROM notebook_versions
             WHERE notebook_id = ? AND version_number = ?",
            params![notebook_id.as_str(), version],
            Self::parse_entry,
        );

        match result {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, notebook_id: NotebookId, limit: usize) -> Result<Vec<VersionEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT notebook_id, version_number, content, created_by, change_summary, created_at
             FROM notebook_versions
             WHERE notebook_id = ?
             ORDER BY version_number DESC
             LIMIT ?",
        )?;

        let entries = stmt
            .query_map(
                params![notebook_id.as_str(), limit as i64],
                Self::parse_entry,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, NotebookRepository, SqliteNotebookRepository};
    use crate::models::{Notebook, WorkspaceId};

    fn setup() -> (Database, NotebookId) {
        let db = Database::open_in_memory().unwrap();
        let notebook = Notebook::new(WorkspaceId::new("ws"), "t", "v1", UserId::new("alice"));
        SqliteNotebookRepository::new(db.connection())
            .create(&notebook)
            .unwrap();
        (db, notebook.id)
    }

    fn entry(notebook_id: NotebookId, version: i64, content: &str) -> VersionEntry {
        VersionEntry {
            notebook_id,
            version_number: version,
            content: content.to_string(),
            created_by: Some(UserId::new("bob")),
            change_summary: String::new(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    #[test]
    fn test_list_newest_first() {
        let (db, id) = setup();
        let repo = SqliteVersionRepository::new(db.connection());
        repo.append(&entry(id, 2, "v2")).unwrap();
        repo.append(&entry(id, 3, "v3")).unwrap();

        let versions: Vec<i64> = repo
            .list(id, 10)
            .unwrap()
            .iter()
            .map(|e| e.version_number)
            .collect();
        assert_eq!(versions, vec![3, 2, 1]);

        assert_eq!(repo.list(id, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_version_rejected() {
        let (db, id) = setup();
        let repo = SqliteVersionRepository::new(db.connection());
        repo.append(&entry(id, 2, "v2")).unwrap();
        assert!(repo.append(&entry(id, 2, "other")).is_err());
        assert_eq!(repo.get(id, 2).unwrap().unwrap().content, "v2");
    }
}
