//! Codec trait and implementations for turning envelopes into bytes.
//!
//! The server handler and the remote client never call `serde_json`
//! directly; they go through a [`Codec`], so the wire format can change
//! without touching either side's logic.

use serde::{Serialize, de::DeserializeOwned};

use crate::{Envelope, Payload, ProtocolError};

/// Encodes Rust values to bytes and decodes bytes back.
///
/// `Send + Sync + 'static` because a single codec instance is shared by
/// every connection task on the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or do
    /// not match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;

    /// Decodes an envelope and checks the correlation rules: responses
    /// must name the request they answer, requests must not.
    fn decode_envelope(&self, data: &[u8]) -> Result<Envelope, ProtocolError> {
        let envelope: Envelope = self.decode(data)?;
        match (&envelope.payload, envelope.reply_to) {
            (Payload::Request(_), Some(reply_to)) => {
                Err(ProtocolError::InvalidMessage(format!(
                    "request {} carries reply_to {reply_to}",
                    envelope.seq
                )))
            }
            (Payload::Response(_), None) => Err(ProtocolError::InvalidMessage(
                format!("response {} has no reply_to", envelope.seq),
            )),
            _ => Ok(envelope),
        }
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// JSON keeps snapshots readable in browser DevTools, which matters for a
/// polling client where the same snapshot is fetched every few seconds.
///
/// ```rust
/// use turnstile_protocol::{Codec, Envelope, JsonCodec, Payload, Request};
///
/// let codec = JsonCodec;
/// let envelope = Envelope {
///     seq: 1,
///     reply_to: None,
///     timestamp: 5000,
///     payload: Payload::Request(Request::Heartbeat { client_time: 5000 }),
/// };
///
/// let bytes = codec.encode(&envelope).unwrap();
/// let decoded = codec.decode_envelope(&bytes).unwrap();
/// assert_eq!(envelope, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
