//! Governed-role synchronization for Rolebridge.
//!
//! Keeps the remote platform's role membership in line with local
//! permission grants, for every linked user, on a fixed schedule:
//!
//! ```text
//!            ┌──────── every period ────────┐
//!            ▼                              │
//! IdentityStore.snapshot() ─→ for each (local, remote):
//!     desired  = governed roles whose node is granted locally   (authoritative context)
//!     current  = RoleDirectory::get_roles(remote)               (worker)
//!     if governed(current) ≠ desired:
//!         RoleDirectory::set_roles(remote, ungoverned(current) ∪ desired)
//! ```
//!
//! Roles outside the governed set are never added or removed. A user whose
//! lookup or update fails is logged and skipped; the rest of the cycle
//! carries on.
//!
//! The reverse direction (a moderator edits roles on the remote side) is
//! handled by [`RoleEventRelay`], which turns each [`RemoteRoleEvent`] into
//! a grant change on the authoritative context.
//!
//! [`RemoteRoleEvent`]: rolebridge_protocol::RemoteRoleEvent

mod error;
mod reconcile;
mod relay;
mod schedule;
mod traits;

pub use error::SyncError;
pub use reconcile::{CycleReport, Reconciler, UserOutcome, permission_node};
pub use relay::RoleEventRelay;
pub use schedule::{RoleSyncScheduler, SyncHandle, SyncSchedule};
pub use traits::{GrantTable, PermissionSource, RoleDirectory};
