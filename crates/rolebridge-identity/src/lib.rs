//! Persistent identity links for Rolebridge.
//!
//! An [`IdentityStore`] maps each local player to at most one remote chat
//! account and each remote account to at most one local player. Links are
//! kept in memory, loaded from a JSON file at startup, and flushed back
//! after every change.
//!
//! The file holds two indexes over the same pairs:
//!
//! ```json
//! {
//!   "by_remote_id": { "80351110224678912": "6f1c…" },
//!   "by_local_id":  { "6f1c…": "80351110224678912" }
//! }
//! ```

mod error;
mod store;
mod table;

pub use error::IdentityError;
pub use store::IdentityStore;
