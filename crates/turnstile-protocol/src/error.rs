//! Error types for the protocol layer.
//!
//! Each crate in Turnstile defines its own error enum. A `ProtocolError`
//! always means the bytes or the message shape were wrong, never that a
//! game rule was broken.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, missing required fields, or an
    /// unknown `type` tag.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded fine but breaks protocol rules, e.g. a
    /// request arriving before `Hello`, or a response where a request
    /// was expected.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
