//! The dispatcher handle: hands work to the worker pool or the
//! authoritative context.

use std::fmt;
use std::future::Future;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::actor::{Command, spawn_authority};
use crate::{DispatchConfig, DispatchError, WorkerPool};

/// Handle to both execution contexts.
///
/// Cheap to clone: an mpsc sender and a [`WorkerPool`]. Every component
/// that needs to cross contexts holds its own clone, passed in at
/// construction.
///
/// ## Lifecycle
///
/// ```text
/// start(state) ──→ run_async / run_sync / run_async_then ... ──→ shutdown() → S
/// ```
///
/// Dropping every handle also stops the authoritative context, but only
/// [`shutdown`](Self::shutdown) gives the state back.
pub struct TaskDispatcher<S> {
    sender: mpsc::Sender<Command<S>>,
    workers: WorkerPool,
}

impl<S> Clone for TaskDispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            workers: self.workers.clone(),
        }
    }
}

impl<S> fmt::Debug for TaskDispatcher<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDispatcher")
            .field("running", &!self.sender.is_closed())
            .field("idle_workers", &self.workers.idle())
            .finish()
    }
}

impl<S: Send + 'static> TaskDispatcher<S> {
    /// Spawns the authoritative context around `state`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(state: S, config: DispatchConfig) -> Self {
        let config = config.validated();
        let sender = spawn_authority(state, config.channel_size);
        tracing::info!(
            channel_size = config.channel_size,
            max_workers = config.max_workers,
            "task dispatcher started"
        );
        Self {
            sender,
            workers: WorkerPool::new(config.max_workers),
        }
    }

    // -----------------------------------------------------------------
    // Authoritative context
    // -----------------------------------------------------------------

    /// Queues `job` on the authoritative context (fire-and-forget).
    ///
    /// Returns once the job is queued, not once it has run. Jobs submitted
    /// through the same handle run in submission order.
    ///
    /// # Errors
    /// [`DispatchError::Unavailable`] if the context has stopped.
    pub async fn run_sync<F>(&self, job: F) -> Result<(), DispatchError>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.sender
            .send(Command::Run(Box::new(job)))
            .await
            .map_err(|_| DispatchError::Unavailable)
    }

    /// Runs `job` on the authoritative context and waits for its result.
    ///
    /// # Errors
    /// - [`DispatchError::Unavailable`]: the context has stopped
    /// - [`DispatchError::JobPanicked`]: the job panicked
    pub async fn call_sync<F, R>(&self, job: F) -> Result<R, DispatchError>
    where
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.run_sync(move |state| {
            let _ = reply_tx.send(job(state));
        })
        .await?;
        reply_rx.await.map_err(|_| DispatchError::JobPanicked)
    }

    // -----------------------------------------------------------------
    // Worker pool
    // -----------------------------------------------------------------

    /// The worker pool on its own, for components that never touch `S`.
    pub fn workers(&self) -> &WorkerPool {
        &self.workers
    }

    /// Runs a future on the worker pool once a worker permit is free.
    ///
    /// # Errors
    /// The returned handle yields [`DispatchError::PoolClosed`] if the pool
    /// was shut down before a permit was granted.
    pub fn run_async<F>(&self, work: F) -> JoinHandle<Result<F::Output, DispatchError>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.workers.run_async(work)
    }

    /// Runs a blocking closure (disk I/O, synchronous clients) on Tokio's
    /// blocking threads, counted against the same worker permits.
    pub fn run_blocking<F, R>(&self, work: F) -> JoinHandle<Result<R, DispatchError>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.workers.run_blocking(work)
    }

    // -----------------------------------------------------------------
    // Composite
    // -----------------------------------------------------------------

    /// Runs `supplier` on the worker pool, then hands its value to
    /// `consumer` on the authoritative context.
    ///
    /// If the supplier yields `Ok(None)`, returns an error, or panics,
    /// `default` is handed to the consumer instead. The continuation always
    /// runs as long as the authoritative context is alive; failures are
    /// logged rather than propagated.
    pub fn run_async_then<T, E, Fut, C>(
        &self,
        supplier: Fut,
        consumer: C,
        default: T,
    ) -> JoinHandle<()>
    where
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
        Fut: Future<Output = Result<Option<T>, E>> + Send + 'static,
        C: FnOnce(&mut S, T) + Send + 'static,
    {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            // The supplier gets its own task so a panic surfaces as a
            // JoinError here instead of unwinding through this one.
            let value = match dispatcher.run_async(supplier).await {
                Ok(Ok(Ok(Some(value)))) => value,
                Ok(Ok(Ok(None))) => default,
                Ok(Ok(Err(e))) => {
                    tracing::warn!(error = %e, "async stage failed, using default");
                    default
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "async stage not run, using default");
                    default
                }
                Err(e) => {
                    tracing::error!(error = %e, "async stage panicked, using default");
                    default
                }
            };

            if let Err(e) = dispatcher.run_sync(move |state| consumer(state, value)).await {
                tracing::warn!(error = %e, "sync continuation dropped");
            }
        })
    }

    // -----------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------

    /// `true` while the authoritative context accepts jobs.
    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Stops both contexts and returns the final state.
    ///
    /// The worker pool stops granting permits immediately; jobs already
    /// running finish. Authoritative jobs queued before this call still
    /// run, in order, before the state is handed back.
    ///
    /// # Errors
    /// [`DispatchError::Unavailable`] if the context had already stopped.
    pub async fn shutdown(&self) -> Result<S, DispatchError> {
        self.workers.close();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(Command::Shutdown { reply: reply_tx })
            .await
            .map_err(|_| DispatchError::Unavailable)?;
        reply_rx.await.map_err(|_| DispatchError::Unavailable)
    }
}
