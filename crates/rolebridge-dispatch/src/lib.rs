//! Execution contexts for Rolebridge.
//!
//! Two places work can run:
//!
//! - **Worker pool**: the tokio runtime, bounded by a permit count. Anything
//!   that waits on the network or the disk goes here.
//! - **Authoritative context**: one actor task that owns the host's shared
//!   state `S` (permission grants, service registries) and applies mutations
//!   to it one at a time, in the order they arrive.
//!
//! [`TaskDispatcher`] is the handle to both. Crossing from a worker to the
//! authoritative context is always an explicit hand-off through the actor's
//! channel; nothing outside the actor ever holds `&mut S`.
//!
//! # Key types
//!
//! - [`TaskDispatcher`]: cloneable handle; `run_async`, `run_sync`, and the
//!   `run_async_then` composite
//! - [`WorkerPool`]: the permit-bounded pool alone, with no state type
//! - [`DispatchConfig`]: channel size and worker permits
//! - [`DispatchError`]: the authoritative context or pool has gone away

mod actor;
mod config;
mod dispatcher;
mod error;
mod pool;

pub use config::DispatchConfig;
pub use dispatcher::TaskDispatcher;
pub use error::DispatchError;
pub use pool::WorkerPool;
