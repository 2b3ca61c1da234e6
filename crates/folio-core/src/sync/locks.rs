//! Per-notebook write locks

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::models::NotebookId;

/// Map size above which idle lock entries are dropped
const PRUNE_THRESHOLD: usize = 1024;

/// Exclusive locks keyed by notebook.
///
/// Writers to one notebook are serialized; writers to different notebooks
/// never wait on each other.
pub struct DocumentLocks {
    locks: Mutex<HashMap<NotebookId, Arc<Mutex<()>>>>,
    timeout: Duration,
}

impl DocumentLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    fn handle(&self, notebook_id: NotebookId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        if locks.len() >= PRUNE_THRESHOLD {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        Arc::clone(locks.entry(notebook_id).or_default())
    }

    /// Run `f` while holding the notebook's lock.
    ///
    /// Fails with the retryable [`Error::LockTimeout`] if the lock is not
    /// acquired within the configured timeout.
    pub fn with_lock<T>(&self, notebook_id: NotebookId, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let handle = self.handle(notebook_id);
        let Some(_guard) = handle.try_lock_for(self.timeout) else {
            tracing::warn!(
                notebook = %notebook_id,
                timeout_ms = self.timeout.as_millis(),
                "Timed out waiting for notebook lock"
            );
            return Err(Error::LockTimeout(notebook_id));
        };
        f()
    }

    /// Number of notebooks with a lock entry
    pub fn tracked(&self) -> usize {
        self.locks.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn test_same_notebook_times_out_while_held() {
        let locks = DocumentLocks::new(Duration::from_millis(20));
        let id = NotebookId::new();
        let (held_tx, held_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        thread::scope(|scope| {
            let locks = &locks;
            scope.spawn(move || {
                locks
                    .with_lock(id, || {
                        held_tx.send(()).unwrap();
                        release_rx.recv().unwrap();
                        Ok(())
                    })
                    .unwrap();
            });

            held_rx.recv().unwrap();
            let err = locks.with_lock(id, || Ok(())).unwrap_err();
            assert!(matches!(err, Error::LockTimeout(timed_out) if timed_out == id));
            assert!(err.is_retryable());

            // Other notebooks are unaffected
            assert_eq!(locks.with_lock(NotebookId::new(), || Ok(7)).unwrap(), 7);

            release_tx.send(()).unwrap();
        });

        assert!(locks.with_lock(id, || Ok(())).is_ok());
    }

    #[test]
    fn test_idle_entries_are_pruned() {
        let locks = DocumentLocks::new(Duration::from_millis(20));
        for _ in 0..PRUNE_THRESHOLD + 10 {
            locks.with_lock(NotebookId::new(), || Ok(())).unwrap();
        }
        assert!(locks.tracked() <= PRUNE_THRESHOLD);
    }

    #[test]
    fn test_errors_from_the_closure_propagate() {
        let locks = DocumentLocks::new(Duration::from_millis(20));
        let result: Result<()> =
            locks.with_lock(NotebookId::new(), || Err(Error::NotFound("x".to_string())));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
