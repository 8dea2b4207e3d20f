//! Remote → local: applies role changes made on the platform as grants.

use std::convert::Infallible;
use std::sync::Arc;

use rolebridge_dispatch::TaskDispatcher;
use rolebridge_identity::IdentityStore;
use rolebridge_protocol::{GovernedRoles, LocalUserId, RemoteRoleEvent, RoleChange};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{GrantTable, permission_node};

/// Consumes [`RemoteRoleEvent`]s and mirrors governed ones into the local
/// grant table.
///
/// For each event the account is resolved to a local user on a worker,
/// then the grant flips on the authoritative context. Events are applied
/// one at a time in arrival order, so an add followed by a remove for the
/// same role ends with the grant revoked. Events for ungoverned roles or
/// unlinked accounts are dropped.
pub struct RoleEventRelay;

impl RoleEventRelay {
    /// Runs until every sender of `events` is dropped.
    pub fn spawn<S: GrantTable>(
        mut events: mpsc::Receiver<RemoteRoleEvent>,
        dispatcher: TaskDispatcher<S>,
        identity: Arc<IdentityStore>,
        governed: GovernedRoles,
        permission_prefix: String,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut relayed = 0u64;
            while let Some(event) = events.recv().await {
                if !governed.contains(&event.role) {
                    tracing::trace!(role = %event.role, "ignoring ungoverned role change");
                    continue;
                }

                let node = permission_node(&permission_prefix, &event.role);
                let granted = event.change == RoleChange::Added;
                let account = event.account;
                let lookup = Arc::clone(&identity);

                let handle = dispatcher.run_async_then(
                    async move { Ok::<_, Infallible>(lookup.get_local_id(&account).map(Some)) },
                    move |table: &mut S, local: Option<LocalUserId>| match local {
                        Some(local) => {
                            table.set_grant(local, &node, granted);
                            tracing::info!(%local, %node, granted, "grant mirrored from remote");
                        }
                        None => tracing::debug!(%node, "role change for unlinked account ignored"),
                    },
                    None,
                );
                if handle.await.is_ok() {
                    relayed += 1;
                }
            }
            tracing::debug!(relayed, "role event relay stopped");
        })
    }
}
