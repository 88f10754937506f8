//! Codec trait and implementations for serializing gateway payloads.
//!
//! The bot itself never talks to the network; when the platform gateway
//! runs in a separate process (a relay, a test harness, the demo), events
//! and replies travel as bytes. The [`Codec`] trait is the strategy for
//! that conversion, and [`JsonCodec`] is the default implementation.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust values to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because a codec is shared by every task that
/// reads from or writes to the gateway.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// This is behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use tempvoice_protocol::{
///     ChannelId, Codec, GatewayEvent, GuildId, JsonCodec, Member, UserId,
///     VoiceStateUpdate,
/// };
///
/// let codec = JsonCodec;
/// let event = GatewayEvent::VoiceStateUpdate(VoiceStateUpdate {
///     member: Member::new(UserId(7), GuildId(1), "alice"),
///     before: None,
///     after: Some(ChannelId(100)),
/// });
///
/// let bytes = codec.encode(&event).unwrap();
/// let decoded: GatewayEvent = codec.decode(&bytes).unwrap();
/// assert_eq!(event, decoded);
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
