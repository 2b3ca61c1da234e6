//! Editing session manager

use rusqlite::Connection;

use crate::db::{SessionRepository, SqliteSessionRepository};
use crate::error::Result;
use crate::models::{EditingSession, Notebook, NotebookId, SessionToken, UserId};

/// Starts, finds and rebases editing sessions on one connection
pub struct SessionManager<'a> {
    sessions: SqliteSessionRepository<'a>,
}

impl<'a> SessionManager<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self {
            sessions: SqliteSessionRepository::new(conn),
        }
    }

    /// Replace any active session of `user_id` with one based on `notebook`'s current state
    pub fn start(&self, notebook: &Notebook, user_id: &UserId) -> Result<EditingSession> {
        let replaced = self.sessions.deactivate_all(notebook.id, user_id)?;
        let session = EditingSession::new(
            notebook.id,
            user_id.clone(),
            notebook.version,
            notebook.content.clone(),
        );
        self.sessions.insert(&session)?;

        tracing::debug!(
            notebook = %notebook.id,
            user = %user_id,
            base_version = notebook.version,
            replaced,
            "Started editing session"
        );
        Ok(session)
    }

    /// The active session matching all three identifiers, if any
    pub fn active(
        &self,
        notebook_id: NotebookId,
        user_id: &UserId,
        token: SessionToken,
    ) -> Result<Option<EditingSession>> {
        Ok(self
            .sessions
            .find_active(notebook_id, user_id, token)?
            .filter(|session| session.matches(notebook_id, user_id, token)))
    }

    /// Move a session's base to a newer notebook state and persist it
    pub fn rebase(&self, session: &mut EditingSession, version: i64, content: &str) -> Result<()> {
        session.rebase(version, content);
        self.sessions.update_base(session)
    }
}
