//! Session types: one pending login attempt and the knobs that bound it.

use std::time::Duration;

use rolebridge_protocol::LocalUserId;
use serde::Deserialize;
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for link session behavior.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long (in seconds) a minted token stays resolvable after it was
    /// last touched. The clock restarts whenever the same token is put
    /// again for the same user.
    ///
    /// Default: 300 seconds (5 minutes).
    pub ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

impl SessionConfig {
    /// The TTL as a [`Duration`].
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

// ---------------------------------------------------------------------------
// LinkSession
// ---------------------------------------------------------------------------

/// A pending link attempt: "whoever comes back with `token` is `local_user`".
///
/// Times are tokio [`Instant`]s so tests can drive expiry with a paused
/// clock instead of sleeping.
#[derive(Debug, Clone)]
pub struct LinkSession {
    /// Opaque value carried through the OAuth `state` parameter.
    pub token: String,

    /// The local player who requested the sign-up URL.
    pub local_user: LocalUserId,

    /// When the token was first minted.
    pub created_at: Instant,

    /// When the token stops being resolvable. `last access + ttl`.
    pub expires_at: Instant,
}

impl LinkSession {
    pub(crate) fn new(token: String, local_user: LocalUserId, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            token,
            local_user,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Restarts the TTL clock from now.
    pub(crate) fn touch(&mut self, ttl: Duration) {
        self.expires_at = Instant::now() + ttl;
    }

    /// `true` once `now` has reached the expiry instant.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}
