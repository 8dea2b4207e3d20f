//! Gateway errors and the unified error type for Rolebridge.

use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rolebridge_dispatch::DispatchError;
use rolebridge_identity::IdentityError;
use rolebridge_oauth::OAuthError;
use rolebridge_protocol::ProtocolError;
use rolebridge_sync::SyncError;

/// Everything that can go wrong in the auth gateway.
///
/// The request-level variants double as the player-facing text: their
/// `Display` output is the response body.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// A required credential is blank. The gateway stays down.
    #[error("auth gateway disabled: {0} is not configured")]
    ConfigurationIncomplete(&'static str),

    /// The gateway isn't running (never started, or disabled).
    #[error("auth gateway is not running")]
    NotRunning,

    /// The loopback listener couldn't be bound.
    #[error("could not bind auth gateway on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// `/login` without an `id`.
    #[error("Invalid id provided")]
    MissingId,

    /// `/callback` without a `state`.
    #[error("Invalid session state!")]
    MissingState,

    /// `/callback` without a `code`.
    #[error("Could not obtain session code!")]
    MissingCode,

    /// The `state` token is unknown, already used, or past its TTL.
    #[error("Session timed out!")]
    SessionExpired,

    /// The code exchange failed. The body is the raw error text.
    #[error(transparent)]
    Exchange(#[from] OAuthError),

    /// The worker pool couldn't run the exchange (closed, or the job
    /// panicked).
    #[error("Link service unavailable: {0}")]
    Workers(#[from] DispatchError),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::MissingId
            | Self::MissingState
            | Self::MissingCode
            | Self::SessionExpired
            | Self::Exchange(_) => StatusCode::ACCEPTED,
            Self::ConfigurationIncomplete(_)
            | Self::NotRunning
            | Self::Bind { .. }
            | Self::Workers(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, self.to_string()).into_response()
    }
}

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `rolebridge` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate. The
/// `#[from]` attribute on each variant auto-generates `From` impls, so the
/// `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    OAuth(#[from] OAuthError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_gateway_error() {
        let err: BridgeError = GatewayError::ConfigurationIncomplete("client_id").into();
        assert!(matches!(err, BridgeError::Gateway(_)));
        assert!(err.to_string().contains("client_id"));
    }

    #[test]
    fn test_from_dispatch_error() {
        let err: BridgeError = DispatchError::Unavailable.into();
        assert!(matches!(err, BridgeError::Dispatch(_)));
    }

    #[test]
    fn test_from_sync_error() {
        let err: BridgeError = SyncError::RemoteLookupMiss("42".into()).into();
        assert!(matches!(err, BridgeError::Sync(_)));
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: BridgeError = ProtocolError::InvalidUserId("x".into()).into();
        assert!(matches!(err, BridgeError::Protocol(_)));
    }

    #[test]
    fn test_session_errors_answer_202_with_text() {
        let response = GatewayError::SessionExpired.into_response();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[test]
    fn test_worker_failure_answers_503() {
        let response = GatewayError::from(DispatchError::PoolClosed).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_oauth_error_converts_to_exchange() {
        let err: GatewayError = OAuthError::MissingField {
            endpoint: "token",
            field: "access_token",
        }
        .into();
        assert_eq!(err.to_string(), "token response has no access_token");
    }
}
