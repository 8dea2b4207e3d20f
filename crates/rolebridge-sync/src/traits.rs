//! Seams to the host: local grants and the remote role directory.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use rolebridge_dispatch::TaskDispatcher;
use rolebridge_protocol::{LocalUserId, RemoteAccountId};

use crate::SyncError;

/// The host's local permission state, owned by the authoritative context.
///
/// Synchronous on purpose: implementors are only ever touched from inside
/// a [`TaskDispatcher`] job, where blocking is not an option and there is
/// nothing to await.
pub trait GrantTable: Send + 'static {
    /// `true` if `user` currently holds `node`.
    fn has_grant(&self, user: LocalUserId, node: &str) -> bool;

    /// Grants or revokes `node` for `user`.
    fn set_grant(&mut self, user: LocalUserId, node: &str, granted: bool);
}

/// Answers "does this user hold these permission nodes?" from a worker.
pub trait PermissionSource: Send + Sync + 'static {
    /// One answer per entry in `nodes`, in the same order.
    fn grants(
        &self,
        user: LocalUserId,
        nodes: Vec<String>,
    ) -> impl Future<Output = Result<Vec<bool>, SyncError>> + Send;
}

/// Grant lookups hop onto the authoritative context, one hop per user.
impl<S: GrantTable> PermissionSource for TaskDispatcher<S> {
    async fn grants(&self, user: LocalUserId, nodes: Vec<String>) -> Result<Vec<bool>, SyncError> {
        let granted: Vec<bool> = self
            .call_sync(move |table: &mut S| {
                nodes
                    .iter()
                    .map(|node| table.has_grant(user, node))
                    .collect()
            })
            .await?;
        Ok(granted)
    }
}

impl<T: PermissionSource> PermissionSource for Arc<T> {
    async fn grants(&self, user: LocalUserId, nodes: Vec<String>) -> Result<Vec<bool>, SyncError> {
        (**self).grants(user, nodes).await
    }
}

/// Role membership on the remote platform.
///
/// Both calls may block on the network; they are only made from workers.
pub trait RoleDirectory: Send + Sync + 'static {
    /// Every role `account` currently holds, by name.
    ///
    /// # Errors
    /// [`SyncError::RemoteLookupMiss`] if the account can't be resolved.
    fn get_roles(
        &self,
        account: &RemoteAccountId,
    ) -> impl Future<Output = Result<BTreeSet<String>, SyncError>> + Send;

    /// Replaces `account`'s role set with `roles` in one call.
    fn set_roles(
        &self,
        account: &RemoteAccountId,
        roles: BTreeSet<String>,
    ) -> impl Future<Output = Result<(), SyncError>> + Send;
}

impl<T: RoleDirectory> RoleDirectory for Arc<T> {
    async fn get_roles(&self, account: &RemoteAccountId) -> Result<BTreeSet<String>, SyncError> {
        (**self).get_roles(account).await
    }

    async fn set_roles(
        &self,
        account: &RemoteAccountId,
        roles: BTreeSet<String>,
    ) -> Result<(), SyncError> {
        (**self).set_roles(account, roles).await
    }
}
