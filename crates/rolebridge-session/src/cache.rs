//! The session cache: token → local user, single use, TTL-bound.
//!
//! # Concurrency note
//!
//! `SessionCache` is NOT thread-safe by itself. It is a plain `HashMap`
//! owned by the gateway behind one `tokio::sync::Mutex`, so a lookup and
//! its removal happen under the same lock. That is what makes
//! [`take_and_invalidate`](SessionCache::take_and_invalidate) atomic: two
//! concurrent callbacks carrying the same token serialize on the lock and
//! only the first one sees the session.

use std::collections::HashMap;

use rand::Rng;
use rolebridge_protocol::LocalUserId;
use tokio::time::Instant;

use crate::{LinkSession, SessionConfig};

/// Pending link sessions keyed by token.
///
/// Expiry is lazy: an expired entry stays in the map until it is either
/// looked up (and discarded) or swept by [`purge_expired`](Self::purge_expired).
/// Either way it is never returned to a caller.
#[derive(Debug)]
pub struct SessionCache {
    sessions: HashMap<String, LinkSession>,
    config: SessionConfig,
}

impl SessionCache {
    /// Creates an empty cache.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            config,
        }
    }

    /// Mints a fresh random token for `local_user` and stores it.
    ///
    /// Every call produces a new token, even for a user who already has one
    /// pending; the older token simply runs out its TTL.
    pub fn mint(&mut self, local_user: LocalUserId) -> String {
        let token = loop {
            let candidate = generate_token();
            if !self.sessions.contains_key(&candidate) {
                break candidate;
            }
        };
        self.put(token.clone(), local_user);
        token
    }

    /// Stores a pending session and starts (or restarts) its TTL clock.
    ///
    /// Returns `false` and leaves the cache untouched if `token` is still
    /// live for a *different* user: a token is never handed to two people.
    /// An expired entry under the same token is replaced.
    pub fn put(&mut self, token: impl Into<String>, local_user: LocalUserId) -> bool {
        let token = token.into();
        let ttl = self.config.ttl();
        let now = Instant::now();

        if let Some(existing) = self.sessions.get_mut(&token) {
            if !existing.is_expired_at(now) {
                if existing.local_user != local_user {
                    tracing::warn!(
                        %local_user,
                        owner = %existing.local_user,
                        "refusing to reuse a live session token for another user"
                    );
                    return false;
                }
                existing.touch(ttl);
                tracing::debug!(%local_user, "link session refreshed");
                return true;
            }
        }

        self.sessions
            .insert(token.clone(), LinkSession::new(token, local_user, ttl));
        tracing::debug!(%local_user, "link session created");
        true
    }

    /// Looks up `token` and removes it in the same step.
    ///
    /// Returns `None` if the token was never minted, was already consumed,
    /// or has outlived its TTL. The entry is gone afterwards in every case.
    pub fn take_and_invalidate(&mut self, token: &str) -> Option<LocalUserId> {
        let session = self.sessions.remove(token)?;
        if session.is_expired_at(Instant::now()) {
            tracing::debug!(local_user = %session.local_user, "link session expired before use");
            return None;
        }
        tracing::info!(local_user = %session.local_user, "link session consumed");
        Some(session.local_user)
    }

    /// Drops every expired session and returns how many were removed.
    ///
    /// Call this periodically so abandoned tokens don't accumulate.
    pub fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired_at(now));
        let removed = before - self.sessions.len();
        if removed > 0 {
            tracing::debug!(removed, "purged expired link sessions");
        }
        removed
    }

    /// Number of stored sessions, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// The configuration this cache was built with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

/// Generates a random 32-character hex string (128 bits of entropy).
fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================
