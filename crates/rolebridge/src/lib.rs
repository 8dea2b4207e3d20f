//! # Rolebridge
//!
//! Links local player identities to accounts on a remote chat platform
//! over OAuth2, and keeps a configured set of "governed" roles in sync
//! between the two.
//!
//! The host hands Rolebridge two things: a [`TaskDispatcher`] that owns its
//! permission grants (see [`GrantTable`]), and a client for the platform's
//! role directory (see [`RoleDirectory`]). Everything else, from the
//! callback server and session tokens to the link file and sync schedule,
//! is configured through [`BridgeConfig`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rolebridge::prelude::*;
//!
//! // let dispatcher = TaskDispatcher::start(my_grants, DispatchConfig::default());
//! // let bridge = RoleBridge::start(config, dispatcher, my_directory).await?;
//! // let url = bridge.sign_up_url(player).await?;
//! ```
//!
//! ## Layers
//!
//! ```text
//! rolebridge           ← AuthGateway (HTTP), RoleBridge wiring, config
//!   ├─ oauth           ← code → access token → account id
//!   ├─ session         ← single-use, TTL-bound link tokens
//!   ├─ identity        ← persistent local ↔ remote links
//!   ├─ sync            ← periodic role reconciliation, remote event relay
//!   ├─ dispatch        ← worker pool + authoritative context
//!   └─ protocol        ← shared types
//! ```

mod config;
mod error;
mod handler;
mod server;
mod service;

pub use config::BridgeConfig;
pub use error::{BridgeError, GatewayError};
pub use server::{AuthGateway, GatewayServer};
pub use service::RoleBridge;

pub use rolebridge_dispatch::{DispatchConfig, TaskDispatcher, WorkerPool};
pub use rolebridge_sync::{GrantTable, RoleDirectory};

/// Installs a `tracing` fmt subscriber filtered by `RUST_LOG`, defaulting
/// to `info`.
///
/// Safe to call more than once. If a global subscriber is already set,
/// by an earlier call or by the host, this does nothing.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub mod prelude {
    //! Everything a host needs to wire Rolebridge in.

    pub use crate::{
        AuthGateway, BridgeConfig, BridgeError, GatewayError, GatewayServer, RoleBridge,
        init_tracing,
    };
    pub use rolebridge_dispatch::{DispatchConfig, DispatchError, TaskDispatcher, WorkerPool};
    pub use rolebridge_identity::IdentityStore;
    pub use rolebridge_oauth::{CodeExchanger, OAuthClient, OAuthEndpoints, OAuthError};
    pub use rolebridge_protocol::{
        AuthResult, GovernedRoles, LocalUserId, RemoteAccountId, RemoteRoleEvent, RoleChange,
    };
    pub use rolebridge_session::SessionConfig;
    pub use rolebridge_sync::{
        CycleReport, GrantTable, RoleDirectory, SyncError, SyncSchedule, UserOutcome,
        permission_node,
    };
}
