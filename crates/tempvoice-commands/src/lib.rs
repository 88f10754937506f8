//! Member-facing room commands.
//!
//! Each command resolves the caller's current room through the
//! [`RoomRegistry`](tempvoice_room::RoomRegistry) and then issues a single
//! [`Provisioner`](tempvoice_room::Provisioner) mutation. Commands never
//! register or unregister rooms.
//!
//! - [`Command`]: a parsed, type-checked invocation
//! - [`RoomCommands`]: executes commands and turns outcomes into replies
//! - [`CommandError`]: everything a command can fail with

mod command;
mod error;
mod handler;

pub use command::{Command, PrivacyMode};
pub use error::CommandError;
pub use handler::{MAX_NAME_CHARS, MAX_USER_LIMIT, RoomCommands};
