//! Error types for the dispatch layer.

/// Errors from handing work to an execution context.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The authoritative context has stopped (shut down, or every handle
    /// was dropped) and can no longer accept jobs.
    #[error("authoritative context is unavailable")]
    Unavailable,

    /// A job accepted by the authoritative context panicked before it
    /// could reply.
    #[error("authoritative job panicked")]
    JobPanicked,

    /// The worker pool has been shut down.
    #[error("worker pool is shut down")]
    PoolClosed,

    /// A worker-pool job panicked.
    #[error("worker job panicked: {0}")]
    WorkerPanicked(String),
}
