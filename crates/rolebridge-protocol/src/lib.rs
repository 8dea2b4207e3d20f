//! Shared vocabulary for Rolebridge.
//!
//! Every other crate in the workspace speaks in terms of these types:
//!
//! - **Identity** ([`LocalUserId`], [`RemoteAccountId`]): the two sides of
//!   an account link.
//! - **Events** ([`AuthResult`], [`RemoteRoleEvent`]): what the gateway
//!   emits after a callback, and what the remote platform reports when a
//!   role changes.
//! - **Roles** ([`GovernedRoles`]): the configured set of roles whose
//!   membership Rolebridge owns.
//! - **Wire payloads** ([`TokenResponse`], [`RemoteProfile`]): the JSON
//!   bodies returned by the remote platform's OAuth endpoints, plus the
//!   [`Codec`] used to decode them.
//!
//! ```text
//! Gateway / Sync (above)  ← consume identities, emit events
//!     ↕
//! Protocol (this crate)   ← plain data, no I/O
//! ```

mod codec;
mod error;
mod roles;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use roles::GovernedRoles;
pub use types::{
    AuthResult, LocalUserId, RemoteAccountId, RemoteProfile, RemoteRoleEvent,
    RoleChange, TokenResponse,
};
