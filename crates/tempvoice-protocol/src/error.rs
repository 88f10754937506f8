//! Error types for the protocol layer.
//!
//! Each crate in tempvoice defines its own error enum. When you see a
//! `ProtocolError`, the problem is in serialization or in the shape of a
//! gateway payload, not in channel provisioning.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust value).
    ///
    /// Common causes: malformed JSON, missing required fields,
    /// or an unknown event type tag.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The payload decoded but violates a protocol rule, e.g. a command
    /// invocation with an empty name.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
