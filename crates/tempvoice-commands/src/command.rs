//! Parsing slash-command invocations into typed commands.

use std::fmt;
use std::str::FromStr;

use tempvoice_protocol::{CommandInvocation, CommandValue};

use crate::CommandError;

/// A room command with its options extracted and type-checked.
///
/// Range checks (name length, limit bounds) happen when the command runs,
/// not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/setname <name>`
    SetName { name: String },
    /// `/setlimit <limit>`
    SetLimit { limit: i64 },
    /// `/private <mode>`
    Private { mode: String },
    /// `/help`
    Help,
    /// `/ping`
    Ping,
}

impl Command {
    /// Every command name, in the order `help` lists them.
    pub const NAMES: [&'static str; 5] = ["setname", "setlimit", "private", "ping", "help"];

    /// Extracts a command from an invocation.
    ///
    /// # Errors
    /// - [`CommandError::UnknownCommand`] for an unrecognized name
    /// - [`CommandError::MissingOption`] if a required option is absent
    /// - [`CommandError::InvalidOption`] if an option has the wrong type
    pub fn parse(invocation: &CommandInvocation) -> Result<Self, CommandError> {
        match invocation.name.as_str() {
            "setname" => Ok(Self::SetName {
                name: string_option(invocation, "name")?,
            }),
            "setlimit" => {
                let limit = match invocation.option("limit") {
                    Some(CommandValue::Integer(n)) => *n,
                    Some(CommandValue::String(_)) => return Err(CommandError::InvalidOption("limit")),
                    None => return Err(CommandError::MissingOption("limit")),
                };
                Ok(Self::SetLimit { limit })
            }
            "private" => Ok(Self::Private {
                mode: string_option(invocation, "mode")?,
            }),
            "help" => Ok(Self::Help),
            "ping" => Ok(Self::Ping),
            other => Err(CommandError::UnknownCommand(other.to_string())),
        }
    }

    /// The name the command is registered under.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetName { .. } => "setname",
            Self::SetLimit { .. } => "setlimit",
            Self::Private { .. } => "private",
            Self::Help => "help",
            Self::Ping => "ping",
        }
    }

    /// One-line usage text for `help`.
    pub fn usage(name: &str) -> Option<&'static str> {
        let usage = match name {
            "setname" => "/setname <name> : rename your room (1-50 characters)",
            "setlimit" => "/setlimit <limit> : cap participants (0-99, 0 = no limit)",
            "private" => "/private <on|off> : make your room invite-only or public",
            "ping" => "/ping : check the bot and count active rooms",
            "help" => "/help : show this list",
            _ => return None,
        };
        Some(usage)
    }
}

fn string_option(invocation: &CommandInvocation, name: &'static str) -> Result<String, CommandError> {
    match invocation.option(name) {
        Some(CommandValue::String(s)) => Ok(s.clone()),
        Some(CommandValue::Integer(_)) => Err(CommandError::InvalidOption(name)),
        None => Err(CommandError::MissingOption(name)),
    }
}

/// Room visibility set by `/private`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivacyMode {
    /// Invite-only: everyone can see the room, only invitees can connect.
    On,
    /// Public: the default role's overwrite is removed.
    Off,
}

impl FromStr for PrivacyMode {
    type Err = CommandError;

    /// Case-insensitive; surrounding whitespace is not trimmed.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("on") {
            Ok(Self::On)
        } else if s.eq_ignore_ascii_case("off") {
            Ok(Self::Off)
        } else {
            Err(CommandError::InvalidMode(s.to_string()))
        }
    }
}

impl fmt::Display for PrivacyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => f.write_str("on"),
            Self::Off => f.write_str("off"),
        }
    }
}
