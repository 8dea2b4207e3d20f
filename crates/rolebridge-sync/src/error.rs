//! Error types for role synchronization.

use rolebridge_dispatch::DispatchError;
use rolebridge_protocol::RemoteAccountId;

/// Why one user's reconciliation didn't complete.
///
/// Always scoped to a single user: the cycle logs it and moves on.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The remote platform doesn't know this account (left the guild,
    /// deleted, never joined).
    #[error("remote account {0} could not be resolved")]
    RemoteLookupMiss(RemoteAccountId),

    /// The remote platform rejected or failed a role read or update.
    #[error("remote role call for {account} failed: {reason}")]
    Remote {
        account: RemoteAccountId,
        reason: String,
    },

    /// The authoritative context couldn't answer a grant lookup.
    #[error("permission lookup failed: {0}")]
    Dispatch(#[from] DispatchError),
}
