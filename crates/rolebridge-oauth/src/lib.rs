//! OAuth2 authorization-code exchange for Rolebridge.
//!
//! The flow needs two outbound calls once the player's browser comes back
//! with a `code`:
//!
//! ```text
//! POST token_url   (form: grant_type, client_id, client_secret, redirect_uri, code)
//!      → { "access_token": "…" }
//! GET  profile_url (Authorization: Bearer …)
//!      → { "id": "…" }
//! ```
//!
//! [`OAuthClient`] performs both and yields the remote account id. The
//! gateway only depends on the [`CodeExchanger`] trait, so its tests can
//! swap in a canned exchanger.

mod client;
mod endpoints;
mod error;

pub use client::{CodeExchanger, OAuthClient};
pub use endpoints::OAuthEndpoints;
pub use error::OAuthError;
