//! Error types for the room layer.

use tempvoice_protocol::ChannelId;

/// Failures reported by a [`Provisioner`](crate::Provisioner).
///
/// These mirror what the platform can tell us about a channel mutation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProvisionError {
    /// The channel (or category) does not exist anymore.
    #[error("channel {0} not found")]
    NotFound(ChannelId),

    /// The bot lacks the rights for this operation.
    #[error("missing permissions: {0}")]
    PermissionDenied(String),

    /// Anything else the platform reported.
    #[error("unexpected provisioner failure: {0}")]
    Unexpected(String),
}

/// Errors that can occur during room lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// A lobby tag or its category could not be resolved.
    /// Logged and the event is ignored; never fatal.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The provisioner rejected an operation.
    #[error(transparent)]
    Provision(#[from] ProvisionError),
}
