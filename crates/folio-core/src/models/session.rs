//! Editing session model

use serde::{Deserialize, Serialize};

use super::id::{NotebookId, SessionToken, UserId};

/// One user's working copy of a notebook.
///
/// `base_version`/`base_content` are what the user's next patch is diffed
/// against. At most one session per (notebook, user) is active at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditingSession {
    /// Opaque session token handed to the client
    pub token: SessionToken,
    /// Notebook being edited
    pub notebook_id: NotebookId,
    /// Editing user
    pub user_id: UserId,
    /// Notebook version the working copy is based on
    pub base_version: i64,
    /// Notebook content the working copy is based on
    pub base_content: String,
    /// Whether this session still accepts patches
    pub is_active: bool,
    /// Creation timestamp (Unix ms)
    pub started_at: i64,
    /// Last rebase timestamp (Unix ms)
    pub last_activity: i64,
}

impl EditingSession {
    /// Start a new active session based on the given notebook state
    #[must_use]
    pub fn new(
        notebook_id: NotebookId,
        user_id: UserId,
        base_version: i64,
        base_content: impl Into<String>,
    ) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            token: SessionToken::new(),
            notebook_id,
            user_id,
            base_version,
            base_content: base_content.into(),
            is_active: true,
            started_at: now,
            last_activity: now,
        }
    }

    /// Move the session base forward to a newer notebook state
    pub fn rebase(&mut self, version: i64, content: impl Into<String>) {
        self.base_version = version;
        self.base_content = content.into();
        self.last_activity = chrono::Utc::now().timestamp_millis();
    }

    /// Whether this session matches the given identifiers exactly
    #[must_use]
    pub fn matches(&self, notebook_id: NotebookId, user_id: &UserId, token: SessionToken) -> bool {
        self.is_active
            && self.notebook_id == notebook_id
            && &self.user_id == user_id
            && self.token == token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebase_moves_base_forward() {
        let mut session = EditingSession::new(NotebookId::new(), UserId::new("bob"), 1, "a");
        session.rebase(3, "abc");
        assert_eq!(session.base_version, 3);
        assert_eq!(session.base_content, "abc");
        assert!(session.last_activity >= session.started_at);
    }

    #[test]
    fn test_matches_requires_all_identifiers() {
        let notebook_id = NotebookId::new();
        let user = UserId::new("bob");
        let session = EditingSession::new(notebook_id, user.clone(), 1, "");

        assert!(session.matches(notebook_id, &user, session.token));
        assert!(!session.matches(NotebookId::new(), &user, session.token));
        assert!(!session.matches(notebook_id, &UserId::new("eve"), session.token));
        assert!(!session.matches(notebook_id, &user, SessionToken::new()));
    }

    #[test]
    fn test_inactive_session_never_matches() {
        let notebook_id = NotebookId::new();
        let user = UserId::new("bob");
        let mut session = EditingSession::new(notebook_id, user.clone(), 1, "");
        session.is_active = false;
        assert!(!session.matches(notebook_id, &user, session.token));
    }
}
