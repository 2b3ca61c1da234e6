//! Post-commit domain events and their observers

use serde::Serialize;

use crate::models::{ConflictId, NotebookId, ResolutionStrategy, UserId};

/// Something that happened to a notebook, emitted only after commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// Notebook content moved to a new version
    NotebookUpdated {
        notebook_id: NotebookId,
        version: i64,
        actor: UserId,
    },
    /// A conflict was queued for manual resolution
    ConflictQueued {
        notebook_id: NotebookId,
        conflict_id: ConflictId,
        actor: UserId,
    },
    /// A pending conflict was resolved
    ConflictResolved {
        notebook_id: NotebookId,
        conflict_id: ConflictId,
        strategy: ResolutionStrategy,
        actor: UserId,
    },
}

/// Receives committed sync events
pub trait SyncObserver: Send + Sync {
    fn on_event(&self, event: &SyncEvent);
}

/// Activity log backed by `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn on_event(&self, event: &SyncEvent) {
        match event {
            SyncEvent::NotebookUpdated {
                notebook_id,
                version,
                actor,
            } => tracing::info!(
                notebook = %notebook_id,
                version,
                actor = %actor,
                "Notebook updated"
            ),
            SyncEvent::ConflictQueued {
                notebook_id,
                conflict_id,
                actor,
            } => tracing::info!(
                notebook = %notebook_id,
                conflict = %conflict_id,
                actor = %actor,
                "Conflict queued for review"
            ),
            SyncEvent::ConflictResolved {
                notebook_id,
                conflict_id,
                strategy,
                actor,
            } => tracing::info!(
                notebook = %notebook_id,
                conflict = %conflict_id,
                strategy = %strategy,
                actor = %actor,
                "Conflict resolved"
            ),
        }
    }
}

/// An operation's outcome plus the events it committed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport<T> {
    pub outcome: T,
    pub events: Vec<SyncEvent>,
}

impl<T> SyncReport<T> {
    pub const fn new(outcome: T, events: Vec<SyncEvent>) -> Self {
        Self { outcome, events }
    }

    /// An outcome that changed nothing
    pub const fn quiet(outcome: T) -> Self {
        Self::new(outcome, Vec::new())
    }

    /// Hand every event to `observer`, in order
    pub fn notify(&self, observer: &dyn SyncObserver) {
        for event in &self.events {
            observer.on_event(event);
        }
    }
}
