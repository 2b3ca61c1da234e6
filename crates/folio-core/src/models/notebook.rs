//! Notebook and version history models

use serde::{Deserialize, Serialize};

use super::id::{NotebookId, UserId, WorkspaceId};

/// A shared notebook document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notebook {
    /// Unique identifier
    pub id: NotebookId,
    /// Workspace the notebook belongs to (drives role lookup)
    pub workspace_id: WorkspaceId,
    /// Display title
    pub title: String,
    /// Current plain text content
    pub content: String,
    /// Current version, starting at 1
    pub version: i64,
    /// Author of the notebook
    pub created_by: UserId,
    /// Author of the latest content mutation
    pub last_modified_by: Option<UserId>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl Notebook {
    /// Create a new notebook at version 1
    #[must_use]
    pub fn new(
        workspace_id: WorkspaceId,
        title: impl Into<String>,
        content: impl Into<String>,
        created_by: UserId,
    ) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: NotebookId::new(),
            workspace_id,
            title: title.into(),
            content: content.into(),
            version: 1,
            created_by,
            last_modified_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One append-only entry of a notebook's version history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    /// Notebook this entry belongs to
    pub notebook_id: NotebookId,
    /// Version number, unique per notebook
    pub version_number: i64,
    /// Full content at this version
    pub content: String,
    /// Who produced this version
    pub created_by: Option<UserId>,
    /// Short description of the change (may be empty)
    pub change_summary: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}
