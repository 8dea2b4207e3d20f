//! Core data types shared across Rolebridge.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A player's identity on the local (game server) side.
///
/// Newtype over [`Uuid`] so it can't be confused with any other id in a
/// function signature. Serializes as the bare hyphenated UUID string,
/// which is also the form used as a key in the persisted link file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LocalUserId(pub Uuid);

impl LocalUserId {
    /// Generates a fresh random id. Mostly useful in tests and demos;
    /// real ids come from the host.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for LocalUserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LocalUserId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| ProtocolError::InvalidUserId(s.to_string()))
    }
}

/// An account identifier on the remote chat platform.
///
/// Opaque and stable. Discord calls these "snowflakes"; we never
/// interpret the contents, only compare and store them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteAccountId(pub String);

impl RemoteAccountId {
    /// Borrow the raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteAccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RemoteAccountId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RemoteAccountId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Outcome of one completed OAuth callback.
///
/// The gateway emits exactly one of these per callback that got as far as
/// resolving a session token. Subscribers use it to notify the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AuthResult {
    /// The remote account was resolved and the link persisted.
    Success {
        local_user: LocalUserId,
        account: RemoteAccountId,
    },
    /// The code exchange failed; `reason` is the raw error text.
    Failure {
        local_user: LocalUserId,
        reason: String,
    },
}

impl AuthResult {
    /// The local user this result concerns, whichever way it went.
    pub fn local_user(&self) -> LocalUserId {
        match self {
            Self::Success { local_user, .. } | Self::Failure { local_user, .. } => *local_user,
        }
    }

    /// `true` for [`AuthResult::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Direction of a role membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleChange {
    Added,
    Removed,
}

/// A role membership change observed on the remote platform.
///
/// Produced by the host's chat client when a moderator edits someone's
/// roles in the guild, and delivered on a typed channel to the role relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRoleEvent {
    pub account: RemoteAccountId,
    pub role: String,
    pub change: RoleChange,
}

impl RemoteRoleEvent {
    /// Shorthand for an `Added` event.
    pub fn added(account: impl Into<RemoteAccountId>, role: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            role: role.into(),
            change: RoleChange::Added,
        }
    }

    /// Shorthand for a `Removed` event.
    pub fn removed(account: impl Into<RemoteAccountId>, role: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            role: role.into(),
            change: RoleChange::Removed,
        }
    }
}

// ---------------------------------------------------------------------------
// Remote wire payloads
// ---------------------------------------------------------------------------

/// Body of `POST <remote>/oauth2/token`.
///
/// Only `access_token` is used. It's optional at the serde level so an
/// error body (`{"error": "invalid_grant"}`) still decodes and we can
/// report the missing field precisely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TokenResponse {
    /// Extracts the access token.
    ///
    /// # Errors
    /// [`ProtocolError::MissingField`] if the token is absent or empty.
    pub fn into_access_token(self) -> Result<String, ProtocolError> {
        match self.access_token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(ProtocolError::MissingField("access_token")),
        }
    }
}

/// Body of `GET <remote>/users/@me`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteProfile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl RemoteProfile {
    /// Extracts the remote account id.
    ///
    /// # Errors
    /// [`ProtocolError::MissingField`] if `id` is absent or empty.
    pub fn into_account_id(self) -> Result<RemoteAccountId, ProtocolError> {
        match self.id {
            Some(id) if !id.is_empty() => Ok(RemoteAccountId(id)),
            _ => Err(ProtocolError::MissingField("id")),
        }
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;

    #[test]
    fn test_local_user_id_parse_valid_uuid() {
        let id = LocalUserId::new_random();
        let parsed: LocalUserId = id.to_string().parse().expect("should parse");
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_local_user_id_parse_garbage_returns_error() {
        let result = "not-a-uuid".parse::<LocalUserId>();
        assert!(matches!(result, Err(ProtocolError::InvalidUserId(s)) if s == "not-a-uuid"));
    }

    #[test]
    fn test_remote_account_id_serializes_transparently() {
        let json = serde_json::to_string(&RemoteAccountId::from("42")).unwrap();
        assert_eq!(json, "\"42\"");
    }

    #[test]
    fn test_token_response_missing_access_token() {
        let body: TokenResponse =
            serde_json::from_str(r#"{"error":"invalid_grant"}"#).unwrap();
        assert!(matches!(
            body.into_access_token(),
            Err(ProtocolError::MissingField("access_token"))
        ));
    }

    #[test]
    fn test_token_response_ignores_unknown_fields() {
        let body: TokenResponse = serde_json::from_str(
            r#"{"access_token":"abc","token_type":"Bearer","expires_in":604800,"scope":"identify"}"#,
        )
        .unwrap();
        assert_eq!(body.into_access_token().unwrap(), "abc");
    }

    #[test]
    fn test_remote_profile_empty_id_is_missing() {
        let body: RemoteProfile = serde_json::from_str(r#"{"id":""}"#).unwrap();
        assert!(matches!(
            body.into_account_id(),
            Err(ProtocolError::MissingField("id"))
        ));
    }

    #[test]
    fn test_auth_result_accessors() {
        let user = LocalUserId::new_random();
        let ok = AuthResult::Success {
            local_user: user,
            account: "42".into(),
        };
        let failed = AuthResult::Failure {
            local_user: user,
            reason: "boom".into(),
        };
        assert!(ok.is_success());
        assert!(!failed.is_success());
        assert_eq!(ok.local_user(), user);
        assert_eq!(failed.local_user(), user);
    }
}
