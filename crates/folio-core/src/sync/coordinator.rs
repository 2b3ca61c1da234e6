//! Sync coordinator: the apply-patch state machine and conflict resolution

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use rusqlite::Connection;

use super::events::{SyncEvent, SyncReport};
use super::locks::DocumentLocks;
use super::outcome::{PatchOutcome, ResolveOutcome, SessionStart};
use super::session::SessionManager;
use crate::config::EngineConfig;
use crate::db::{
    ConflictRepository, Database, NotebookRepository, SqliteConflictRepository,
    SqliteNotebookRepository, SqliteVersionRepository, VersionRepository,
};
use crate::error::{Error, Result};
use crate::merge::{three_way_merge, MergeOutcome};
use crate::models::{
    Conflict, ConflictId, EditingSession, Notebook, NotebookId, ResolutionStrategy, SessionToken,
    UserId, VersionEntry, WorkspaceId,
};
use crate::patch;
use crate::protocol::{ConflictSummary, VersionStatus};
use crate::roles::{effective_role, RoleLookup};

const AUTO_MERGE_SUMMARY: &str = "Auto-merged concurrent edits";
const OVERRIDE_SUMMARY: &str = "Owner override";

/// Serializes writers per notebook and runs every write in one transaction.
///
/// Each call opens its own connection, so a coordinator can be shared
/// across threads freely.
pub struct SyncCoordinator {
    config: EngineConfig,
    roles: Arc<dyn RoleLookup>,
    locks: DocumentLocks,
}

impl SyncCoordinator {
    /// Prepare the database at `config.database_path` and build a coordinator
    pub fn open(config: EngineConfig, roles: Arc<dyn RoleLookup>) -> Result<Self> {
        if let Some(parent) = config
            .database_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            fs::create_dir_all(parent)?;
        }
        Database::open(&config.database_path, config.busy_timeout)?;

        tracing::info!(
            path = %config.database_path.display(),
            lock_timeout_ms = config.lock_timeout.as_millis(),
            "Sync coordinator ready"
        );
        Ok(Self {
            locks: DocumentLocks::new(config.lock_timeout),
            config,
            roles,
        })
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn connect(&self) -> Result<Database> {
        Database::connect(&self.config.database_path, self.config.busy_timeout)
    }

    /// Create a notebook at version 1
    pub fn create_notebook(
        &self,
        workspace_id: WorkspaceId,
        title: &str,
        content: &str,
        created_by: UserId,
    ) -> Result<Notebook> {
        let notebook = Notebook::new(workspace_id, title, content, created_by);
        let mut db = self.connect()?;
        let tx = db.write_transaction()?;
        SqliteNotebookRepository::new(&tx).create(&notebook)?;
        tx.commit()?;

        tracing::debug!(notebook = %notebook.id, "Created notebook");
        Ok(notebook)
    }

    pub fn get_notebook(&self, notebook_id: NotebookId) -> Result<Notebook> {
        let db = self.connect()?;
        load_notebook(db.connection(), notebook_id)
    }

    /// Start (or restart) `user_id`'s editing session on the current notebook state
    pub fn start_session(&self, notebook_id: NotebookId, user_id: &UserId) -> Result<SessionStart> {
        self.locks.with_lock(notebook_id, || {
            let mut db = self.connect()?;
            let tx = db.write_transaction()?;
            let notebook = load_notebook(&tx, notebook_id)?;
            let session = SessionManager::new(&tx).start(&notebook, user_id)?;
            tx.commit()?;

            Ok(SessionStart {
                session,
                current_version: notebook.version,
            })
        })
    }

    pub fn get_active_session(
        &self,
        notebook_id: NotebookId,
        user_id: &UserId,
        token: SessionToken,
    ) -> Result<Option<EditingSession>> {
        let db = self.connect()?;
        SessionManager::new(db.connection()).active(notebook_id, user_id, token)
    }

    /// Apply a client patch made against the session's base.
    ///
    /// A blank `patch_text` polls for changes instead.
    pub fn apply_patch(
        &self,
        notebook_id: NotebookId,
        user_id: &UserId,
        token: SessionToken,
        patch_text: &str,
    ) -> Result<SyncReport<PatchOutcome>> {
        self.locks.with_lock(notebook_id, || {
            let mut db = self.connect()?;
            let tx = db.write_transaction()?;
            let report = self.apply_patch_locked(&tx, notebook_id, user_id, token, patch_text)?;
            tx.commit()?;

            tracing::info!(
                notebook = %notebook_id,
                user = %user_id,
                status = ?report.outcome.status(),
                version = ?report.outcome.version(),
                "Processed patch"
            );
            Ok(report)
        })
    }

    fn apply_patch_locked(
        &self,
        conn: &Connection,
        notebook_id: NotebookId,
        user_id: &UserId,
        token: SessionToken,
        patch_text: &str,
    ) -> Result<SyncReport<PatchOutcome>> {
        let sessions = SessionManager::new(conn);
        let Some(mut session) = sessions.active(notebook_id, user_id, token)? else {
            return Ok(SyncReport::quiet(PatchOutcome::SessionInvalid));
        };
        let notebook = load_notebook(conn, notebook_id)?;

        if patch_text.trim().is_empty() {
            if notebook.version > session.base_version {
                sessions.rebase(&mut session, notebook.version, &notebook.content)?;
                return Ok(SyncReport::quiet(PatchOutcome::Pulled {
                    version: notebook.version,
                    content: notebook.content,
                }));
            }
            return Ok(SyncReport::quiet(PatchOutcome::UpToDate {
                version: notebook.version,
            }));
        }

        if notebook.version == session.base_version {
            let result = patch::apply(&notebook.content, patch_text);
            if !result.all_applied {
                return Ok(SyncReport::quiet(PatchOutcome::PatchFailed));
            }

            let version = commit_content(conn, &notebook, &result.text, user_id, "")?;
            sessions.rebase(&mut session, version, &result.text)?;
            return Ok(SyncReport::new(
                PatchOutcome::Applied {
                    version,
                    content: result.text,
                },
                vec![updated(notebook_id, version, user_id)],
            ));
        }

        let mine = patch::apply(&session.base_content, patch_text);
        if !mine.all_applied {
            return Ok(SyncReport::quiet(PatchOutcome::PatchFailed));
        }
        let mine = mine.text;
        let conflicts = SqliteConflictRepository::new(conn);

        match three_way_merge(&session.base_content, &mine, &notebook.content) {
            MergeOutcome::Merged(merged) => {
                let version = commit_content(conn, &notebook, &merged, user_id, AUTO_MERGE_SUMMARY)?;
                let audit = Conflict::pending(&session, version, mine, notebook.content, Vec::new())
                    .resolve_with(ResolutionStrategy::AutoMerged, merged.clone(), user_id.clone());
                conflicts.insert(&audit)?;
                sessions.rebase(&mut session, version, &merged)?;

                tracing::debug!(notebook = %notebook_id, version, "Auto-merged concurrent edits");
                Ok(SyncReport::new(
                    PatchOutcome::AutoMerged {
                        version,
                        content: merged,
                    },
                    vec![updated(notebook_id, version, user_id)],
                ))
            }
            MergeOutcome::Conflicted(blocks)
                if self.config.is_elevated(effective_role(
                    self.roles.as_ref(),
                    &notebook.workspace_id,
                    user_id,
                )) =>
            {
                let version = commit_content(conn, &notebook, &mine, user_id, OVERRIDE_SUMMARY)?;
                let audit = Conflict::pending(&session, version, mine.clone(), notebook.content, blocks)
                    .resolve_with(ResolutionStrategy::Yours, mine.clone(), user_id.clone());
                conflicts.insert(&audit)?;
                sessions.rebase(&mut session, version, &mine)?;

                tracing::debug!(
                    notebook = %notebook_id,
                    version,
                    conflicts = audit.conflict_blocks.len(),
                    "Privileged edit overrode concurrent changes"
                );
                Ok(SyncReport::new(
                    PatchOutcome::AutoMerged {
                        version,
                        content: mine,
                    },
                    vec![updated(notebook_id, version, user_id)],
                ))
            }
            MergeOutcome::Conflicted(blocks) => {
                let conflict =
                    Conflict::pending(&session, notebook.version, mine, notebook.content, blocks);
                conflicts.insert(&conflict)?;

                Ok(SyncReport::new(
                    PatchOutcome::ConflictPending {
                        conflict_id: conflict.id,
                    },
                    vec![SyncEvent::ConflictQueued {
                        notebook_id,
                        conflict_id: conflict.id,
                        actor: user_id.clone(),
                    }],
                ))
            }
        }
    }

    /// Resolve a pending conflict, committing the chosen content as a new version
    pub fn resolve_conflict(
        &self,
        conflict_id: ConflictId,
        user_id: &UserId,
        strategy: ResolutionStrategy,
        final_content: Option<&str>,
    ) -> Result<SyncReport<ResolveOutcome>> {
        // The owning notebook never changes, so it can be read before locking
        let notebook_id = self.get_conflict(conflict_id)?.notebook_id;

        self.locks.with_lock(notebook_id, || {
            let mut db = self.connect()?;
            let tx = db.write_transaction()?;
            let report = resolve_locked(&tx, conflict_id, user_id, strategy, final_content)?;
            tx.commit()?;

            tracing::info!(
                notebook = %notebook_id,
                conflict = %conflict_id,
                strategy = %strategy,
                version = report.outcome.version,
                "Resolved conflict"
            );
            Ok(report)
        })
    }

    pub fn get_conflict(&self, conflict_id: ConflictId) -> Result<Conflict> {
        let db = self.connect()?;
        SqliteConflictRepository::new(db.connection())
            .get(conflict_id)?
            .ok_or_else(|| Error::NotFound(format!("conflict {conflict_id}")))
    }

    /// Current version, last author and pending conflict count
    pub fn check_version(&self, notebook_id: NotebookId) -> Result<VersionStatus> {
        let mut db = self.connect()?;
        let tx = db.read_transaction()?;
        let notebook = load_notebook(&tx, notebook_id)?;
        let pending_conflicts = SqliteConflictRepository::new(&tx).count_pending(notebook_id)?;
        tx.finish()?;

        Ok(VersionStatus {
            notebook_id,
            version: notebook.version,
            last_modified_by: notebook.last_modified_by,
            pending_conflicts,
        })
    }

    /// Pending conflicts, newest first, optionally for one notebook
    pub fn list_pending_conflicts(
        &self,
        notebook_id: Option<NotebookId>,
    ) -> Result<Vec<ConflictSummary>> {
        let db = self.connect()?;
        let conn = db.connection();
        let notebooks = SqliteNotebookRepository::new(conn);
        let mut titles: HashMap<NotebookId, String> = HashMap::new();

        let pending = SqliteConflictRepository::new(conn).list_pending(notebook_id)?;
        let mut summaries = Vec::with_capacity(pending.len());
        for conflict in pending {
            let notebook_title = match titles.get(&conflict.notebook_id) {
                Some(title) => title.clone(),
                None => {
                    let title = notebooks
                        .get(conflict.notebook_id)?
                        .map(|notebook| notebook.title)
                        .unwrap_or_default();
                    titles.insert(conflict.notebook_id, title.clone());
                    title
                }
            };
            summaries.push(ConflictSummary {
                id: conflict.id,
                notebook_id: conflict.notebook_id,
                notebook_title,
                user_id: conflict.user_id,
                server_version: conflict.server_version,
                client_version: conflict.client_version,
                conflict_blocks: conflict.conflict_blocks,
                created_at: conflict.created_at,
            });
        }
        Ok(summaries)
    }

    /// Version history, newest first
    pub fn list_versions(&self, notebook_id: NotebookId, limit: usize) -> Result<Vec<VersionEntry>> {
        let db = self.connect()?;
        SqliteVersionRepository::new(db.connection()).list(notebook_id, limit)
    }
}

fn resolve_locked(
    conn: &Connection,
    conflict_id: ConflictId,
    user_id: &UserId,
    strategy: ResolutionStrategy,
    final_content: Option<&str>,
) -> Result<SyncReport<ResolveOutcome>> {
    let conflicts = SqliteConflictRepository::new(conn);
    let conflict = conflicts
        .get(conflict_id)?
        .ok_or_else(|| Error::NotFound(format!("conflict {conflict_id}")))?;
    if !conflict.is_pending() {
        return Err(Error::AlreadyResolved(conflict_id));
    }

    let content = match strategy {
        ResolutionStrategy::Yours => conflict.your_content,
        ResolutionStrategy::Theirs => conflict.their_content,
        ResolutionStrategy::Manual => final_content
            .ok_or_else(|| {
                Error::InvalidStrategy("MANUAL resolution requires final content".to_string())
            })?
            .to_string(),
        ResolutionStrategy::Pending | ResolutionStrategy::AutoMerged => {
            return Err(Error::InvalidStrategy(strategy.to_string()));
        }
    };

    let notebook = load_notebook(conn, conflict.notebook_id)?;
    let summary = format!("Conflict resolved: {strategy}");
    let version = commit_content(conn, &notebook, &content, user_id, &summary)?;
    if !conflicts.mark_resolved(conflict_id, strategy, &content, user_id)? {
        return Err(Error::AlreadyResolved(conflict_id));
    }

    Ok(SyncReport::new(
        ResolveOutcome {
            version,
            content,
            strategy,
        },
        vec![
            updated(notebook.id, version, user_id),
            SyncEvent::ConflictResolved {
                notebook_id: notebook.id,
                conflict_id,
                strategy,
                actor: user_id.clone(),
            },
        ],
    ))
}

fn load_notebook(conn: &Connection, notebook_id: NotebookId) -> Result<Notebook> {
    SqliteNotebookRepository::new(conn)
        .get(notebook_id)?
        .ok_or_else(|| Error::NotFound(format!("notebook {notebook_id}")))
}

/// Move `notebook` to its next version and append the matching history entry
fn commit_content(
    conn: &Connection,
    notebook: &Notebook,
    content: &str,
    actor: &UserId,
    change_summary: &str,
) -> Result<i64> {
    let version = notebook.version + 1;
    SqliteNotebookRepository::new(conn).update_content(notebook.id, content, version, actor)?;
    SqliteVersionRepository::new(conn).append(&VersionEntry {
        notebook_id: notebook.id,
        version_number: version,
        content: content.to_string(),
        created_by: Some(actor.clone()),
        change_summary: change_summary.to_string(),
        created_at: chrono::Utc::now().timestamp_millis(),
    })?;
    Ok(version)
}

fn updated(notebook_id: NotebookId, version: i64, actor: &UserId) -> SyncEvent {
    SyncEvent::NotebookUpdated {
        notebook_id,
        version,
        actor: actor.clone(),
    }
}
