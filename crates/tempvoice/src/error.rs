//! Unified error type for the tempvoice crates.

use tempvoice_commands::CommandError;
use tempvoice_protocol::ProtocolError;
use tempvoice_room::RoomError;

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TempVoiceError {
    /// Encoding or decoding a gateway message failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (configuration, provisioning).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A command failed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
