//! Typed results of sync operations

use serde::{Deserialize, Serialize};

use crate::models::{ConflictId, EditingSession, ResolutionStrategy};

/// Wire status of an apply-patch call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    AutoMerged,
    ConflictPending,
    NoChanges,
    Pulled,
    Error,
}

/// What `apply_patch` decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    /// No active session matches the caller; nothing changed
    SessionInvalid,
    /// Empty patch and the session is current; nothing changed
    UpToDate { version: i64 },
    /// Empty patch and the session was behind; it now matches the notebook
    Pulled { version: i64, content: String },
    /// Patch applied on top of an unchanged notebook
    Applied { version: i64, content: String },
    /// Patch could not be applied to its own base; nothing changed
    PatchFailed,
    /// Concurrent edits were combined (or overridden by a privileged actor)
    AutoMerged { version: i64, content: String },
    /// Edits conflict; a pending conflict was recorded
    ConflictPending { conflict_id: ConflictId },
}

impl PatchOutcome {
    pub const fn status(&self) -> SyncStatus {
        match self {
            Self::Applied { .. } => SyncStatus::Success,
            Self::AutoMerged { .. } => SyncStatus::AutoMerged,
            Self::ConflictPending { .. } => SyncStatus::ConflictPending,
            Self::UpToDate { .. } => SyncStatus::NoChanges,
            Self::Pulled { .. } => SyncStatus::Pulled,
            Self::SessionInvalid | Self::PatchFailed => SyncStatus::Error,
        }
    }

    /// Notebook version the client should now hold
    pub const fn version(&self) -> Option<i64> {
        match self {
            Self::UpToDate { version }
            | Self::Pulled { version, .. }
            | Self::Applied { version, .. }
            | Self::AutoMerged { version, .. } => Some(*version),
            Self::SessionInvalid | Self::PatchFailed | Self::ConflictPending { .. } => None,
        }
    }

    /// Content the client must adopt
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Pulled { content, .. }
            | Self::Applied { content, .. }
            | Self::AutoMerged { content, .. } => Some(content),
            _ => None,
        }
    }

    pub const fn conflict_id(&self) -> Option<ConflictId> {
        match self {
            Self::ConflictPending { conflict_id } => Some(*conflict_id),
            _ => None,
        }
    }

    /// Human-readable note for the client
    pub const fn message(&self) -> Option<&'static str> {
        match self {
            Self::SessionInvalid => Some("Invalid or expired editing session"),
            Self::PatchFailed => Some("Patch application failed"),
            Self::Pulled { .. } => Some("Pulled latest changes"),
            Self::AutoMerged { .. } => Some("Changes merged automatically"),
            Self::ConflictPending { .. } => Some("Changes queued for review"),
            Self::UpToDate { .. } | Self::Applied { .. } => None,
        }
    }
}

/// Result of resolving a conflict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOutcome {
    pub version: i64,
    pub content: String,
    pub strategy: ResolutionStrategy,
}

/// A freshly started editing session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStart {
    pub session: EditingSession,
    pub current_version: i64,
}
