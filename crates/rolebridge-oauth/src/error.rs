//! Error types for the code exchange.

use rolebridge_protocol::ProtocolError;

/// Why a code exchange didn't produce an account id.
///
/// The `Display` text of these errors is what the player ends up seeing on
/// a failed callback, so messages name the step that broke.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// The HTTP client itself couldn't be built (TLS backend, bad config).
    #[error("could not build http client: {0}")]
    Client(#[source] reqwest::Error),

    /// A configured endpoint isn't a valid URL.
    #[error("invalid {endpoint} url: {url}")]
    InvalidUrl { endpoint: &'static str, url: String },

    /// Connect, timeout, or I/O failure talking to the remote.
    #[error("{endpoint} request failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The remote answered with a non-success status.
    #[error("{endpoint} request returned {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    /// The body wasn't the JSON we expected.
    #[error("{endpoint} response could not be decoded: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: ProtocolError,
    },

    /// The body decoded but lacked a required field.
    #[error("{endpoint} response has no {field}")]
    MissingField {
        endpoint: &'static str,
        field: &'static str,
    },
}

impl OAuthError {
    pub(crate) fn from_protocol(endpoint: &'static str, err: ProtocolError) -> Self {
        match err {
            ProtocolError::MissingField(field) => Self::MissingField { endpoint, field },
            source => Self::Decode { endpoint, source },
        }
    }
}
