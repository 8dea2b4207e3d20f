//! Codec for the remote platform's response bodies.
//!
//! The OAuth client doesn't care how a body is encoded, only that it can
//! turn bytes into a [`TokenResponse`](crate::TokenResponse) or
//! [`RemoteProfile`](crate::RemoteProfile). Keeping that behind a trait
//! lets tests feed canned bytes without a network round-trip.

use serde::de::DeserializeOwned;

use crate::ProtocolError;

/// Decodes response bodies into typed values.
///
/// `Send + Sync + 'static` so one codec can sit inside a long-lived
/// client shared across request handlers.
pub trait Codec: Send + Sync + 'static {
    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or
    /// don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`. The remote platform speaks JSON.
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
