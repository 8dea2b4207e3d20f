//! Link session tokens for Rolebridge.
//!
//! When a player asks for a sign-up URL, the server mints an opaque token
//! and remembers which local user it belongs to. The player's browser
//! carries the token through the remote platform's OAuth flow and back to
//! the callback route, where it is resolved exactly once.
//!
//! # Lifecycle
//!
//! ```text
//! absent ──(mint / put)──→ pending ──(take_and_invalidate)──→ consumed
//!                             │
//!                             └──(TTL elapses)──→ absent
//! ```
//!
//! There is deliberately no way to read a session without consuming it.

mod cache;
mod session;

pub use cache::SessionCache;
pub use session::{LinkSession, SessionConfig};
