//! Notebook repository implementation

use crate::error::{Error, Result};
use crate::models::{Notebook, NotebookId, UserId, VersionEntry, WorkspaceId};
use rusqlite::{params, Connection};

use super::parse_column;
use super::version_repository::{SqliteVersionRepository, VersionRepository};

/// Trait for notebook storage operations
pub trait NotebookRepository {
    /// Store a new notebook together with its version-1 history entry
    fn create(&self, notebook: &Notebook) -> Result<()>;

    /// Get a notebook by ID
    fn get(&self, id: NotebookId) -> Result<Option<Notebook>>;

    /// Replace a notebook's content, moving it to `version`
    ///
    /// Fails unless the stored version is exactly `version - 1`.
    fn update_content(
        &self,
        id: NotebookId,
        content: &str,
        version: i64,
        modified_by: &UserId,
    ) -> Result<()>;
}

/// `SQLite` implementation of `NotebookRepository`
pub struct SqliteNotebookRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteNotebookRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a notebook from a database row
    fn parse_notebook(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notebook> {
        Ok(Notebook {
            id: parse_column(row, 0)?,
            workspace_id: WorkspaceId::from(row.get::<_, String>(1)?),
            title: row.get(2)?,
            content: row.get(3)?,
            version: row.get(4)?,
            created_by: UserId::from(row.get::<_, String>(5)?),
            last_modified_by: row.get::<_, Option<String>>(6)?.map(UserId::from),
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

impl NotebookRepository for SqliteNotebookRepository<'_> {
    fn create(&self, notebook: &Notebook) -> Result<()> {
        self.conn.execute(
            "INSERT INTO notebooks (id, workspace_id, title, content, version, created_by,
                                    last_modified_by, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                notebook.id.as_str(),
                notebook.workspace_id.as_str(),
                notebook.title,
                notebook.content,
                notebook.version,
                notebook.created_by.as_str(),
                notebook.last_modified_by.as_ref().map(UserId::as_str),
                notebook.created_at,
                notebook.updated_at,
            ],
        )?;

        SqliteVersionRepository::new(self.conn).append(&VersionEntry {
            notebook_id: notebook.id,
            version_number: notebook.version,
            content: notebook.content.clone(),
            created_by: Some(notebook.created_by.clone()),
            change_summary: "Created".to_string(),
            created_at: notebook.created_at,
        })
    }

    fn get(&self, id: NotebookId) -> Result<Option<Notebook>> {
        let result = self.conn.query_row(
            "SELECT id, workspace_id, title, content, version, created_by, last_modified_by,
                    created_at, updated_at
             FROM notebooks WHERE id = ?",
            params![id.as_str()],
            Self::parse_notebook,
        );

        match result {
            Ok(notebook) => Ok(Some(notebook)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn update_content(
        &self,
        id: NotebookId,
        content: &str,
        version: i64,
        modified_by: &UserId,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();

        let rows = self.conn.execute(
            "UPDATE notebooks
             SET content = ?, version = ?, last_modified_by = ?, updated_at = ?
             WHERE id = ? AND version = ?",
            params![
                content,
                version,
                modified_by.as_str(),
                now,
                id.as_str(),
                version - 1
            ],
        )?;

        if rows == 0 {
            return Err(Error::Database(format!(
                "notebook {id} is not at version {}",
                version - 1
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn sample() -> Notebook {
        Notebook::new(
            WorkspaceId::new("ws-1"),
            "Shared plans",
            "L1\nL2\nL3",
            UserId::new("alice"),
        )
    }

    #[test]
    fn test_create_and_get() {
        let db = setup();
        let repo = SqliteNotebookRepository::new(db.connection());

        let notebook = sample();
        repo.create(&notebook).unwrap();

        let fetched = repo.get(notebook.id).unwrap().unwrap();
        assert_eq!(fetched, notebook);
    }

    #[test]
    fn test_create_seeds_first_version() {
        let db = setup();
        let repo = SqliteNotebookRepository::new(db.connection());
        let notebook = sample();
        repo.create(&notebook).unwrap();

        let versions = SqliteVersionRepository::new(db.connection());
        let first = versions.get(notebook.id, 1).unwrap().unwrap();
        assert_eq!(first.content, "L1\nL2\nL3");
    }

    #[test]
    fn test_get_missing() {
        let db = setup();
        let repo = SqliteNotebookRepository::new(db.connection());
        assert!(repo.get(NotebookId::new()).unwrap().is_none());
    }

    #[test]
    fn test_update_content_advances_version() {
        let db = setup();
        let repo = SqliteNotebookRepository::new(db.connection());
        let notebook = sample();
        repo.create(&notebook).unwrap();

        let bob = UserId::new("bob");
        repo.update_content(notebook.id, "new", 2, &bob).unwrap();

        let fetched = repo.get(notebook.id).unwrap().unwrap();
        assert_eq!(fetched.content, "new");
        assert_eq!(fetched.version, 2);
        assert_eq!(fetched.last_modified_by, Some(bob));
    }

    #[test]
    fn test_update_content_rejects_version_skip() {
        let db = setup();
        let repo = SqliteNotebookRepository::new(db.connection());
        let notebook = sample();
        repo.create(&notebook).unwrap();

        let result = repo.update_content(notebook.id, "new", 3, &UserId::new("bob"));
        assert!(matches!(result, Err(Error::Database(_))));
        assert_eq!(repo.get(notebook.id).unwrap().unwrap().version, 1);
    }
}
