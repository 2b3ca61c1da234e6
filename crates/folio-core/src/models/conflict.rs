//! Merge conflict model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::id::{ConflictId, NotebookId, UserId};
use super::session::EditingSession;
use crate::error::Error;

/// A single line where both sides diverged from the base and from each other
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictBlock {
    /// 1-based line number
    pub line_number: usize,
    /// Line in the common ancestor
    pub base: String,
    /// Line in the acting user's version
    pub yours: String,
    /// Line in the concurrently committed version
    pub theirs: String,
}

/// How (and whether) a conflict was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionStrategy {
    /// Awaiting a manual decision
    Pending,
    /// Merged automatically (audit record)
    AutoMerged,
    /// The acting user's content won
    Yours,
    /// The concurrently committed content won
    Theirs,
    /// Content supplied by the resolver
    Manual,
}

impl ResolutionStrategy {
    /// Stable storage/wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::AutoMerged => "AUTO_MERGED",
            Self::Yours => "YOURS",
            Self::Theirs => "THEIRS",
            Self::Manual => "MANUAL",
        }
    }

    /// Whether a resolver may pick this strategy for a pending conflict
    #[must_use]
    pub const fn is_user_choice(self) -> bool {
        matches!(self, Self::Yours | Self::Theirs | Self::Manual)
    }
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "AUTO_MERGED" => Ok(Self::AutoMerged),
            "YOURS" => Ok(Self::Yours),
            "THEIRS" => Ok(Self::Theirs),
            "MANUAL" => Ok(Self::Manual),
            other => Err(Error::InvalidStrategy(other.to_string())),
        }
    }
}

/// A recorded merge failure, or an audit record of an automatic resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// Unique identifier
    pub id: ConflictId,
    /// Notebook the conflict belongs to
    pub notebook_id: NotebookId,
    /// User whose patch produced the conflict
    pub user_id: UserId,
    /// Notebook version at conflict time (after the commit, for audit rows)
    pub server_version: i64,
    /// Session base version the patch was made against
    pub client_version: i64,
    /// Common ancestor content
    pub base_content: String,
    /// Acting user's reconstructed content
    pub your_content: String,
    /// Concurrently committed content
    pub their_content: String,
    /// Final content, empty until resolved
    pub resolved_content: String,
    /// Conflicting lines, in line order
    pub conflict_blocks: Vec<ConflictBlock>,
    /// Resolution state; leaves `Pending` exactly once
    pub resolution_strategy: ResolutionStrategy,
    /// Who resolved it
    pub resolved_by: Option<UserId>,
    /// Resolution timestamp (Unix ms)
    pub resolved_at: Option<i64>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl Conflict {
    /// Record a pending conflict for a patch made in `session`
    #[must_use]
    pub fn pending(
        session: &EditingSession,
        server_version: i64,
        your_content: String,
        their_content: String,
        conflict_blocks: Vec<ConflictBlock>,
    ) -> Self {
        Self {
            id: ConflictId::new(),
            notebook_id: session.notebook_id,
            user_id: session.user_id.clone(),
            server_version,
            client_version: session.base_version,
            base_content: session.base_content.clone(),
            your_content,
            their_content,
            resolved_content: String::new(),
            conflict_blocks,
            resolution_strategy: ResolutionStrategy::Pending,
            resolved_by: None,
            resolved_at: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Mark as resolved in memory, e.g. for audit rows written already resolved
    #[must_use]
    pub fn resolve_with(
        mut self,
        strategy: ResolutionStrategy,
        resolved_content: impl Into<String>,
        resolved_by: UserId,
    ) -> Self {
        self.resolution_strategy = strategy;
        self.resolved_content = resolved_content.into();
        self.resolved_by = Some(resolved_by);
        self.resolved_at = Some(chrono::Utc::now().timestamp_millis());
        self
    }

    /// Whether the conflict still awaits a decision
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.resolution_strategy == ResolutionStrategy::Pending
    }
}
