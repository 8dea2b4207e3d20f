//! Error types for the protocol layer.

/// Errors that can occur while decoding remote payloads or parsing ids.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The body was not valid JSON, or didn't match the expected shape.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A field the remote platform must always send was absent or empty.
    #[error("missing field `{0}` in response")]
    MissingField(&'static str),

    /// A local user id string wasn't a valid UUID.
    #[error("invalid local user id `{0}`")]
    InvalidUserId(String),
}
