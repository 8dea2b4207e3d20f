//! One reconciliation pass: per-user diff and a single role update.

use std::collections::BTreeSet;

use rolebridge_protocol::{GovernedRoles, LocalUserId, RemoteAccountId};

use crate::{PermissionSource, RoleDirectory, SyncError};

/// The permission node that grants `role`: `prefix` + lower-cased role.
///
/// ```
/// # use rolebridge_sync::permission_node;
/// assert_eq!(permission_node("rolebridge.role.", "Patron"), "rolebridge.role.patron");
/// ```
pub fn permission_node(prefix: &str, role: &str) -> String {
    format!("{prefix}{}", role.to_lowercase())
}

/// What reconciling one user did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserOutcome {
    /// Governed roles already matched; no remote update was sent.
    Unchanged,
    /// One update was sent.
    Updated {
        added: Vec<String>,
        removed: Vec<String>,
    },
}

/// Tally of one full cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// 1-based cycle number, set by the scheduler (0 for ad-hoc runs).
    pub cycle: u64,
    pub users: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

/// Computes and applies the governed-role diff for linked users.
///
/// Generic over where grants come from and where roles live, so the same
/// logic runs against the real dispatcher and platform client or against
/// in-memory fakes.
#[derive(Debug)]
pub struct Reconciler<P, D> {
    governed: GovernedRoles,
    permission_prefix: String,
    permissions: P,
    directory: D,
}

impl<P: PermissionSource, D: RoleDirectory> Reconciler<P, D> {
    pub fn new(
        governed: GovernedRoles,
        permission_prefix: impl Into<String>,
        permissions: P,
        directory: D,
    ) -> Self {
        Self {
            governed,
            permission_prefix: permission_prefix.into(),
            permissions,
            directory,
        }
    }

    pub fn governed(&self) -> &GovernedRoles {
        &self.governed
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// The node that grants `role` under this reconciler's prefix.
    pub fn node_for(&self, role: &str) -> String {
        permission_node(&self.permission_prefix, role)
    }

    /// Governed roles `user` should hold, in configured spelling.
    pub async fn desired_roles(&self, user: LocalUserId) -> Result<BTreeSet<String>, SyncError> {
        let nodes = self.governed.iter().map(|r| self.node_for(r)).collect();
        let granted = self.permissions.grants(user, nodes).await?;
        Ok(self
            .governed
            .iter()
            .zip(granted)
            .filter_map(|(role, ok)| ok.then(|| role.to_string()))
            .collect())
    }

    /// Brings one user's governed roles in line with their grants.
    ///
    /// Sends at most one `set_roles` call, and none at all when the
    /// governed subset already matches. Ungoverned roles pass through
    /// untouched, and governed roles that stay keep the remote spelling.
    pub async fn reconcile_user(
        &self,
        local: LocalUserId,
        remote: &RemoteAccountId,
    ) -> Result<UserOutcome, SyncError> {
        if self.governed.is_empty() {
            return Ok(UserOutcome::Unchanged);
        }

        let desired = self.desired_roles(local).await?;
        let current = self.directory.get_roles(remote).await?;

        let wanted: BTreeSet<String> = desired.iter().map(|r| r.to_lowercase()).collect();
        let held: BTreeSet<String> = current
            .iter()
            .filter(|r| self.governed.contains(r))
            .map(|r| r.to_lowercase())
            .collect();

        if wanted == held {
            tracing::trace!(%local, account = %remote, "governed roles already in sync");
            return Ok(UserOutcome::Unchanged);
        }

        let added: Vec<String> = desired
            .iter()
            .filter(|r| !held.contains(&r.to_lowercase()))
            .cloned()
            .collect();
        let removed: Vec<String> = current
            .iter()
            .filter(|r| self.governed.contains(r) && !wanted.contains(&r.to_lowercase()))
            .cloned()
            .collect();

        let mut next: BTreeSet<String> = current
            .into_iter()
            .filter(|r| !self.governed.contains(r) || wanted.contains(&r.to_lowercase()))
            .collect();
        next.extend(added.iter().cloned());

        self.directory.set_roles(remote, next).await?;
        tracing::info!(%local, account = %remote, ?added, ?removed, "governed roles updated");
        Ok(UserOutcome::Updated { added, removed })
    }

    /// Reconciles every link in `links`, isolating failures per user.
    pub async fn run_cycle(&self, links: &[(LocalUserId, RemoteAccountId)]) -> CycleReport {
        let mut report = CycleReport {
            users: links.len(),
            ..CycleReport::default()
        };

        for (local, remote) in links {
            match self.reconcile_user(*local, remote).await {
                Ok(UserOutcome::Unchanged) => report.unchanged += 1,
                Ok(UserOutcome::Updated { .. }) => report.updated += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(%local, account = %remote, error = %e, "role sync failed for user");
                }
            }
        }

        tracing::debug!(
            users = report.users,
            updated = report.updated,
            unchanged = report.unchanged,
            failed = report.failed,
            "role sync cycle finished"
        );
        report
    }
}
