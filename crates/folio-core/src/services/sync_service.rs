//! Async facade over the blocking sync coordinator.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::models::{ConflictId, NotebookId, UserId};
use crate::protocol::{
    ApplyPatchRequest, ApplyPatchResponse, ConflictSummary, ResolveConflictRequest,
    ResolveConflictResponse, StartSessionResponse, VersionStatus,
};
use crate::roles::RoleLookup;
use crate::sync::{SyncCoordinator, SyncObserver, SyncReport, TracingObserver};

/// Cloneable handle running coordinator calls on the blocking pool.
///
/// Committed events go to every registered observer once the call returns.
#[derive(Clone)]
pub struct SyncService {
    coordinator: Arc<SyncCoordinator>,
    observers: Vec<Arc<dyn SyncObserver>>,
}

impl SyncService {
    /// Wrap a coordinator; events are logged through [`TracingObserver`]
    pub fn new(coordinator: SyncCoordinator) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
            observers: vec![Arc::new(TracingObserver)],
        }
    }

    /// Open the database described by `config` without blocking the runtime
    pub async fn open(config: EngineConfig, roles: Arc<dyn RoleLookup>) -> Result<Self> {
        let coordinator = tokio::task::spawn_blocking(move || SyncCoordinator::open(config, roles))
            .await
            .map_err(|e| Error::Database(format!("Sync task failed: {e}")))??;
        Ok(Self::new(coordinator))
    }

    /// Register another observer of committed events
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&SyncCoordinator) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let coordinator = Arc::clone(&self.coordinator);
        tokio::task::spawn_blocking(move || f(&coordinator))
            .await
            .map_err(|e| Error::Database(format!("Sync task failed: {e}")))?
    }

    fn dispatch<T>(&self, report: SyncReport<T>) -> T {
        for observer in &self.observers {
            report.notify(observer.as_ref());
        }
        report.outcome
    }

    pub async fn start_session(
        &self,
        notebook_id: NotebookId,
        user_id: UserId,
    ) -> Result<StartSessionResponse> {
        let start = self
            .run(move |coordinator| coordinator.start_session(notebook_id, &user_id))
            .await?;
        Ok(StartSessionResponse::from(&start))
    }

    pub async fn apply_patch(
        &self,
        notebook_id: NotebookId,
        user_id: UserId,
        request: ApplyPatchRequest,
    ) -> Result<ApplyPatchResponse> {
        let token = request.validate(self.coordinator.config().max_patch_bytes)?;
        tracing::debug!(
            notebook = %notebook_id,
            user = %user_id,
            client = request.client(),
            patch_bytes = request.patch.len(),
            "Patch received"
        );
        let report = self
            .run(move |coordinator| {
                coordinator.apply_patch(notebook_id, &user_id, token, &request.patch)
            })
            .await?;
        Ok(ApplyPatchResponse::from(&self.dispatch(report)))
    }

    pub async fn check_version(&self, notebook_id: NotebookId) -> Result<VersionStatus> {
        self.run(move |coordinator| coordinator.check_version(notebook_id))
            .await
    }

    pub async fn list_pending_conflicts(
        &self,
        notebook_id: Option<NotebookId>,
    ) -> Result<Vec<ConflictSummary>> {
        self.run(move |coordinator| coordinator.list_pending_conflicts(notebook_id))
            .await
    }

    pub async fn resolve_conflict(
        &self,
        conflict_id: ConflictId,
        user_id: UserId,
        request: ResolveConflictRequest,
    ) -> Result<ResolveConflictResponse> {
        let strategy = request.validate()?;
        let report = self
            .run(move |coordinator| {
                coordinator.resolve_conflict(
                    conflict_id,
                    &user_id,
                    strategy,
                    request.final_content.as_deref(),
                )
            })
            .await?;
        Ok(ResolveConflictResponse::from(&self.dispatch(report)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkspaceId;
    use crate::patch;
    use crate::roles::MemberDirectory;
    use crate::sync::{SyncEvent, SyncStatus};
    use parking_lot::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<SyncEvent>>);

    impl SyncObserver for Recorder {
        fn on_event(&self, event: &SyncEvent) {
            self.0.lock().push(event.clone());
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_service_round_trip() {
        let dir = tempdir().unwrap();
        let config = EngineConfig::with_database_path(dir.path().join("nested/folio.db"));
        let recorder = Arc::new(Recorder::default());
        let service = SyncService::open(config, Arc::new(MemberDirectory::new()))
            .await
            .unwrap()
            .with_observer(recorder.clone());

        let alice = UserId::new("alice");
        let notebook = service
            .coordinator()
            .create_notebook(WorkspaceId::new("ws"), "Notes", "hello", alice.clone())
            .unwrap();

        let start = service.start_session(notebook.id, alice.clone()).await.unwrap();
        assert_eq!(start.base_version, 1);
        assert_eq!(start.base_content, "hello");

        let request = ApplyPatchRequest {
            session_token: start.session_token.to_string(),
            patch: patch::diff("hello", "hello world"),
            client_id: Some("laptop".to_string()),
        };
        let response = service
            .apply_patch(notebook.id, alice.clone(), request)
            .await
            .unwrap();
        assert_eq!(response.status, SyncStatus::Success);
        assert_eq!(response.version, Some(2));
        assert_eq!(response.content.as_deref(), Some("hello world"));

        let status = service.check_version(notebook.id).await.unwrap();
        assert_eq!(status.version, 2);
        assert_eq!(status.last_modified_by, Some(alice.clone()));
        assert_eq!(status.pending_conflicts, 0);
        assert!(service.list_pending_conflicts(None).await.unwrap().is_empty());

        assert_eq!(
            *recorder.0.lock(),
            vec![SyncEvent::NotebookUpdated {
                notebook_id: notebook.id,
                version: 2,
                actor: alice,
            }]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_oversized_patch_rejected_before_coordinator() {
        let dir = tempdir().unwrap();
        let mut config = EngineConfig::with_database_path(dir.path().join("folio.db"));
        config.max_patch_bytes = 8;
        let service = SyncService::open(config, Arc::new(MemberDirectory::new()))
            .await
            .unwrap();

        let request = ApplyPatchRequest {
            session_token: "irrelevant".to_string(),
            patch: "x".repeat(9),
            client_id: None,
        };
        let err = service
            .apply_patch(NotebookId::new(), UserId::new("bob"), request)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
