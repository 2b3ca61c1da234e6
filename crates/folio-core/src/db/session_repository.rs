//! Editing session repository implementation

use crate::error::{Error, Result};
use crate::models::{EditingSession, NotebookId, SessionToken, UserId};
use rusqlite::{params, Connection};

use super::parse_column;

/// Trait for editing session storage
pub trait SessionRepository {
    /// Deactivate every active session of `user_id` on `notebook_id`
    ///
    /// Returns how many sessions were deactivated.
    fn deactivate_all(&self, notebook_id: NotebookId, user_id: &UserId) -> Result<usize>;

    /// Store a new session
    fn insert(&self, session: &EditingSession) -> Result<()>;

    /// Find an active session matching all three identifiers
    fn find_active(
        &self,
        notebook_id: NotebookId,
        user_id: &UserId,
        token: SessionToken,
    ) -> Result<Option<EditingSession>>;

    /// Persist a session's base version/content and activity time
    fn update_base(&self, session: &EditingSession) -> Result<()>;

    /// Count active sessions of `user_id` on `notebook_id`
    fn count_active(&self, notebook_id: NotebookId, user_id: &UserId) -> Result<usize>;
}

/// `SQLite` implementation of `SessionRepository`
pub struct SqliteSessionRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSessionRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<EditingSession> {
        Ok(EditingSession {
            token: parse_column(row, 0)?,
            notebook_id: parse_column(row, 1)?,
            user_id: UserId::from(row.get::<_, String>(2)?),
            base_version: row.get(3)?,
            base_content: row.get(4)?,
            is_active: row.get::<_, i32>(5)? != 0,
            started_at: row.get(6)?,
            last_activity: row.get(7)?,
        })
    }
}

impl SessionRepository for SqliteSessionRepository<'_> {
    fn deactivate_all(&self, notebook_id: NotebookId, user_id: &UserId) -> Result<usize> {
        let rows = self.conn.execute(
            "UPDATE editing_sessions SET is_active = 0
             WHERE notebook_id = ? AND user_id = ? AND is_active = 1",
            params![notebook_id.as_str(), user_id.as_str()],
        )?;
        Ok(rows)
    }

    fn insert(&self, session: &EditingSession) -> Result<()> {
        self.conn.execute(
            "INSERT INTO editing_sessions (token, notebook_id, user_id, base_version,
                                           base_content, is_active, started_at, last_activity)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                session.token.as_str(),
                session.notebook_id.as_str(),
                session.user_id.as_str(),
                session.base_version,
                session.base_content,
                i32::from(session.is_active),
                session.started_at,
                session.last_activity,
            ],
        )?;
        Ok(())
    }

    fn find_active(
        &self,
        notebook_id: NotebookId,
        user_id: &UserId,
        token: SessionToken,
    ) -> Result<Option<EditingSession>> {
        let result = self.conn.query_row(
            "SELECT token, notebook_id, user_id, base_version, base_content, is_active,
                    started_at, last_activity
             FROM editing_sessions
             WHERE token = ? AND notebook_id = ? AND user_id = ? AND is_active = 1",
            params![token.as_str(), notebook_id.as_str(), user_id.as_str()],
            Self::parse_session,
        );

        match result {
            Ok(session) => Ok(Some(session)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn update_base(&self, session: &EditingSession) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE editing_sessions
             SET base_version = ?, base_content = ?, last_activity = ?
             WHERE token = ?",
            params![
                session.base_version,
                session.base_content,
                session.last_activity,
                session.token.as_str(),
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(format!("session {}", session.token)));
        }
        Ok(())
    }

    fn count_active(&self, notebook_id: NotebookId, user_id: &UserId) -> Result<usize> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM editing_sessions
             WHERE notebook_id = ? AND user_id = ? AND is_active = 1",
            params![notebook_id.as_str(), user_id.as_str()],
            |row| row.get::<_, usize>(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, NotebookRepository, SqliteNotebookRepository};
    use crate::models::{Notebook, WorkspaceId};

    fn setup() -> (Database, NotebookId) {
        let db = Database::open_in_memory().unwrap();
        let notebook = Notebook::new(WorkspaceId::new("ws"), "t", "base", UserId::new("alice"));
        SqliteNotebookRepository::new(db.connection())
            .create(&notebook)
            .unwrap();
        (db, notebook.id)
    }

    #[test]
    fn test_insert_and_find_active() {
        let (db, id) = setup();
        let repo = SqliteSessionRepository::new(db.connection());
        let bob = UserId::new("bob");
        let session = EditingSession::new(id, bob.clone(), 1, "base");
        repo.insert(&session).unwrap();

        let found = repo.find_active(id, &bob, session.token).unwrap().unwrap();
        assert_eq!(found, session);

        assert!(repo
            .find_active(id, &UserId::new("eve"), session.token)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_second_active_session_is_rejected_by_schema() {
        let (db, id) = setup();
        let repo = SqliteSessionRepository::new(db.connection());
        let bob = UserId::new("bob");
        repo.insert(&EditingSession::new(id, bob.clone(), 1, "base"))
            .unwrap();
        assert!(repo
            .insert(&EditingSession::new(id, bob.clone(), 1, "base"))
            .is_err());

        assert_eq!(repo.deactivate_all(id, &bob).unwrap(), 1);
        repo.insert(&EditingSession::new(id, bob.clone(), 1, "base"))
            .unwrap();
        assert_eq!(repo.count_active(id, &bob).unwrap(), 1);
    }

    #[test]
    fn test_update_base() {
        let (db, id) = setup();
        let repo = SqliteSessionRepository::new(db.connection());
        let bob = UserId::new("bob");
        let mut session = EditingSession::new(id, bob.clone(), 1, "base");
        repo.insert(&session).unwrap();

        session.rebase(2, "next");
        repo.update_base(&session).unwrap();

        let found = repo.find_active(id, &bob, session.token).unwrap().unwrap();
        assert_eq!(found.base_version, 2);
        assert_eq!(found.base_content, "next");
    }
}
