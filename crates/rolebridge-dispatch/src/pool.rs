//! The bounded worker pool.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::DispatchError;

/// Permit-bounded pool for work that waits on the network or the disk.
///
/// Cheap to clone; clones share one permit count. Not tied to any state
/// type, so components that never touch the authoritative context (the
/// HTTP gateway, the sync loop) can hold one without naming `S`.
///
/// Every job runs in its own spawned task. Dropping the returned
/// [`JoinHandle`] detaches the job; it still runs to completion.
#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("idle", &self.permits.available_permits())
            .field("closed", &self.permits.is_closed())
            .finish()
    }
}

impl WorkerPool {
    /// A pool that runs at most `max_workers` jobs at once (minimum 1).
    pub fn new(max_workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_workers.max(1))),
        }
    }

    /// Runs a future once a permit is free.
    ///
    /// # Errors
    /// The returned handle yields [`DispatchError::PoolClosed`] if the pool
    /// was closed before a permit was granted.
    pub fn run_async<F>(&self, work: F) -> JoinHandle<Result<F::Output, DispatchError>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|_| DispatchError::PoolClosed)?;
            Ok(work.await)
        })
    }

    /// Runs a blocking closure on Tokio's blocking threads, counted against
    /// the same permits.
    pub fn run_blocking<F, R>(&self, work: F) -> JoinHandle<Result<R, DispatchError>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|_| DispatchError::PoolClosed)?;
            tokio::task::spawn_blocking(work)
                .await
                .map_err(|e| DispatchError::WorkerPanicked(e.to_string()))
        })
    }

    /// Permits not currently held by a job.
    pub fn idle(&self) -> usize {
        self.permits.available_permits()
    }

    /// Stops granting permits. Jobs already holding one finish.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }
}
