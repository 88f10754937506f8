//! Error types for the command layer.

use tempvoice_room::ProvisionError;

/// Errors a room command can fail with.
///
/// The `Display` text is what the invoking member sees, so it is phrased
/// for them rather than for operators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The caller is not connected to a managed room.
    #[error("this command only works from inside your temporary room")]
    NotInOwnRoom,

    /// Room name outside 1–50 characters. Carries the offending length.
    #[error("room name must be 1 to 50 characters long (got {0})")]
    InvalidName(usize),

    /// Participant limit outside 0–99.
    #[error("limit must be between 0 and 99 (got {0})")]
    InvalidLimit(i64),

    /// Privacy mode other than "on" or "off".
    #[error("mode must be 'on' or 'off' (got '{0}')")]
    InvalidMode(String),

    /// A required option was not supplied.
    #[error("missing option '{0}'")]
    MissingOption(&'static str),

    /// An option was supplied with the wrong type.
    #[error("option '{0}' has the wrong type")]
    InvalidOption(&'static str),

    /// No command with this name exists.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// The bot lacks the platform permissions for the change.
    #[error("the bot is missing permissions for this: {0}")]
    PermissionDenied(String),

    /// Any other platform failure.
    #[error("something went wrong: {0}")]
    Unexpected(String),
}

impl CommandError {
    /// Returns `true` for errors caused by the caller's input, which are
    /// rejected before any platform call is made.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidName(_)
                | Self::InvalidLimit(_)
                | Self::InvalidMode(_)
                | Self::MissingOption(_)
                | Self::InvalidOption(_)
        )
    }
}

impl From<ProvisionError> for CommandError {
    fn from(err: ProvisionError) -> Self {
        match err {
            ProvisionError::PermissionDenied(reason) => Self::PermissionDenied(reason),
            // The room vanished between lookup and mutation.
            ProvisionError::NotFound(_) => Self::NotInOwnRoom,
            ProvisionError::Unexpected(reason) => Self::Unexpected(reason),
        }
    }
}
