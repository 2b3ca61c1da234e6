//! Conflict store

use crate::error::Result;
use crate::models::{Conflict, ConflictBlock, ConflictId, NotebookId, ResolutionStrategy, UserId};
use rusqlite::{params, Connection};

use super::parse_column;

/// Columns selected for a full conflict row
const CONFLICT_COLUMNS: &str = "id, notebook_id, user_id, server_version, client_version,
    base_content, your_content, their_content, resolved_content, conflict_blocks,
    resolution_strategy, resolved_by, resolved_at, created_at";

/// Trait for conflict storage operations
pub trait ConflictRepository {
    /// Store a new conflict (pending or audit record)
    fn insert(&self, conflict: &Conflict) -> Result<()>;

    /// Get a conflict by ID
    fn get(&self, id: ConflictId) -> Result<Option<Conflict>>;

    /// List pending conflicts, newest first, optionally for one notebook
    fn list_pending(&self, notebook_id: Option<NotebookId>) -> Result<Vec<Conflict>>;

    /// Count a notebook's pending conflicts
    fn count_pending(&self, notebook_id: NotebookId) -> Result<usize>;

    /// Move a pending conflict to its final state
    ///
    /// Returns `false` (and changes nothing) if the conflict is not pending.
    fn mark_resolved(
        &self,
        id: ConflictId,
        strategy: ResolutionStrategy,
        resolved_content: &str,
        resolved_by: &UserId,
    ) -> Result<bool>;
}

/// `SQLite` implementation of `ConflictRepository`
pub struct SqliteConflictRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteConflictRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_conflict(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conflict> {
        let blocks: String = row.get(9)?;
        let conflict_blocks: Vec<ConflictBlock> = serde_json::from_str(&blocks).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Conflict {
            id: parse_column(row, 0)?,
            notebook_id: parse_column(row, 1)?,
            user_id: UserId::from(row.get::<_, String>(2)?),
            server_version: row.get(3)?,
            client_version: row.get(4)?,
            base_content: row.get(5)?,
            your_content: row.get(6)?,
            their_content: row.get(7)?,
            resolved_content: row.get(8)?,
            conflict_blocks,
            resolution_strategy: parse_column(row, 10)?,
            resolved_by: row.get::<_, Option<String>>(11)?.map(UserId::from),
            resolved_at: row.get(12)?,
            created_at: row.get(13)?,
        })
    }
}

impl ConflictRepository for SqliteConflictRepository<'_> {
    fn insert(&self, conflict: &Conflict) -> Result<()> {
        let blocks = serde_json::to_string(&conflict.conflict_blocks)?;

        self.conn.execute(
            "INSERT INTO notebook_conflicts (id, notebook_id, user_id, server_version,
                 client_version, base_content, your_content, their_content, resolved_content,
                 conflict_blocks, resolution_strategy, resolved_by, resolved_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                conflict.id.as_str(),
                conflict.notebook_id.as_str(),
                conflict.user_id.as_str(),
                conflict.server_version,
                conflict.client_version,
                conflict.base_content,
                conflict.your_content,
                conflict.their_content,
                conflict.resolved_content,
                blocks,
                conflict.resolution_strategy.as_str(),
                conflict.resolved_by.as_ref().map(UserId::as_str),
                conflict.resolved_at,
                conflict.created_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: ConflictId) -> Result<Option<Conflict>> {
        let result = self.conn.query_row(
            &format!("SELECT {CONFLICT_COLUMNS} FROM notebook_conflicts WHERE id = ?"),
            params![id.as_str()],
            Self::parse_conflict,
        );

        match result {
            Ok(conflict) => Ok(Some(conflict)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_pending(&self, notebook_id: Option<NotebookId>) -> Result<Vec<Conflict>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CONFLICT_COLUMNS}
             FROM notebook_conflicts
             WHERE resolution_strategy = 'PENDING' AND (?1 IS NULL OR notebook_id = ?1)
             ORDER BY created_at DESC, id DESC"
        ))?;

        let conflicts = stmt
            .query_map(
                params![notebook_id.map(|id| id.as_str())],
                Self::parse_conflict,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(conflicts)
    }

    fn count_pending(&self, notebook_id: NotebookId) -> Result<usize> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM notebook_conflicts
             WHERE notebook_id = ? AND resolution_strategy = 'PENDING'",
            params![notebook_id.as_str()],
            |row| row.get::<_, usize>(0),
        )?;
        Ok(count)
    }

    fn mark_resolved(
        &self,
        id: ConflictId,
        strategy: ResolutionStrategy,
        resolved_content: &str,
        resolved_by: &UserId,
    ) -> Result<bool> {
        let now = chrono::Utc::now().timestamp_millis();

        let rows = self.conn.execute(
            "UPDATE notebook_conflicts
             SET resolution_strategy = ?, resolved_content = ?, resolved_by = ?, resolved_at = ?
             WHERE id = ? AND resolution_strategy = 'PENDING'",
            params![
                strategy.as_str(),
                resolved_content,
                resolved_by.as_str(),
                now,
                id.as_str()
            ],
        )?;
        Ok(rows == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, NotebookRepository, SqliteNotebookRepository};
    use crate::models::{Notebook, WorkspaceId};

    fn setup() -> (Database, NotebookId) {
        let db = Database::open_in_memory().unwrap();
        let notebook = Notebook::new(WorkspaceId::new("ws"), "t", "L1\nL2", UserId::new("alice"));
        SqliteNotebookRepository::new(db.connection())
            .create(&notebook)
            .unwrap();
        (db, notebook.id)
    }

    fn pending(notebook_id: NotebookId, created_at: i64) -> Conflict {
        Conflict {
            id: ConflictId::new(),
            notebook_id,
            user_id: UserId::new("bob"),
            server_version: 2,
            client_version: 1,
            base_content: "L1\nL2".to_string(),
            your_content: "L1\nL2 Client".to_string(),
            their_content: "L1\nL2 Server".to_string(),
            resolved_content: String::new(),
            conflict_blocks: vec![ConflictBlock {
                line_number: 2,
                base: "L2".to_string(),
                yours: "L2 Client".to_string(),
                theirs: "L2 Server".to_string(),
            }],
            resolution_strategy: ResolutionStrategy::Pending,
            resolved_by: None,
            resolved_at: None,
            created_at,
        }
    }

    #[test]
    fn test_insert_and_get_round_trips_blocks() {
        let (db, id) = setup();
        let repo = SqliteConflictRepository::new(db.connection());
        let conflict = pending(id, 10);
        repo.insert(&conflict).unwrap();

        let fetched = repo.get(conflict.id).unwrap().unwrap();
        assert_eq!(fetched, conflict);
    }

    #[test]
    fn test_list_pending_newest_first_and_filtered() {
        let (db, id) = setup();
        let repo = SqliteConflictRepository::new(db.connection());
        let older = pending(id, 10);
        let newer = pending(id, 20);
        repo.insert(&older).unwrap();
        repo.insert(&newer).unwrap();

        let all = repo.list_pending(None).unwrap();
        assert_eq!(
            all.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![newer.id, older.id]
        );

        assert_eq!(repo.list_pending(Some(id)).unwrap().len(), 2);
        assert!(repo.list_pending(Some(NotebookId::new())).unwrap().is_empty());
        assert_eq!(repo.count_pending(id).unwrap(), 2);
    }

    #[test]
    fn test_mark_resolved_is_single_shot() {
        let (db, id) = setup();
        let repo = SqliteConflictRepository::new(db.connection());
        let conflict = pending(id, 10);
        repo.insert(&conflict).unwrap();

        let bob = UserId::new("bob");
        assert!(repo
            .mark_resolved(conflict.id, ResolutionStrategy::Yours, "L1\nL2 Client", &bob)
            .unwrap());
        assert!(!repo
            .mark_resolved(conflict.id, ResolutionStrategy::Theirs, "L1\nL2 Server", &bob)
            .unwrap());

        let fetched = repo.get(conflict.id).unwrap().unwrap();
        assert_eq!(fetched.resolution_strategy, ResolutionStrategy::Yours);
        assert_eq!(fetched.resolved_content, "L1\nL2 Client");
        assert_eq!(fetched.resolved_by, Some(bob));
        assert!(fetched.resolved_at.is_some());
        assert_eq!(repo.count_pending(id).unwrap(), 0);
    }
}
