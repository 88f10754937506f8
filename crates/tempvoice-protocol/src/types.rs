//! Core protocol types: identities, gateway events, and command envelopes.
//!
//! Every type here is something the platform gateway hands to the bot, or
//! something the bot hands back. They are serde-derived so a gateway
//! running out of process can ship them as JSON.

use serde::{Deserialize, Serialize};

use std::fmt;

use crate::error::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifier of a channel (voice channel, lobby, or category).
///
/// Channel ids are opaque handles issued by the platform. The newtype keeps
/// them from being confused with user or guild ids, which share the same
/// numeric space on most platforms.
///
/// `#[serde(transparent)]` makes `ChannelId(42)` serialize as just `42`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C-{}", self.0)
    }
}

/// Identifier of a user (a guild member, or the bot itself).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// Identifier of a guild (the server the bot operates in).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GuildId(pub u64);

impl fmt::Display for GuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Member
// ---------------------------------------------------------------------------

/// A snapshot of a guild member as the gateway delivered it.
///
/// `voice_channel` is the channel the member was connected to when the
/// snapshot was taken. For command invocations this is how the command
/// layer finds "the caller's current room".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: UserId,
    pub guild_id: GuildId,
    pub display_name: String,
    #[serde(default)]
    pub voice_channel: Option<ChannelId>,
}

impl Member {
    /// Creates a member snapshot that is not connected to any voice channel.
    pub fn new(id: UserId, guild_id: GuildId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            guild_id,
            display_name: display_name.into(),
            voice_channel: None,
        }
    }

    /// Returns the same snapshot, connected to `channel`.
    pub fn in_channel(mut self, channel: ChannelId) -> Self {
        self.voice_channel = Some(channel);
        self
    }
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

/// A per-channel permission overwrite.
///
/// Each field is tri-state: `Some(true)` explicitly allows, `Some(false)`
/// explicitly denies, `None` inherits from the category/guild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverwrite {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_channel: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manage_channels: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manage_roles: Option<bool>,
}

impl PermissionOverwrite {
    /// Returns `true` if this overwrite sets nothing (everything inherits).
    pub fn is_empty(&self) -> bool {
        self.view_channel.is_none()
            && self.connect.is_none()
            && self.manage_channels.is_none()
            && self.manage_roles.is_none()
    }
}

/// Who a [`PermissionOverwrite`] applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwriteTarget {
    /// The guild's default role (everyone).
    DefaultRole,
    /// One specific user, a member or the bot itself.
    Member(UserId),
}

/// The initial overwrites applied when a channel is created, in order.
pub type AccessRules = Vec<(OverwriteTarget, PermissionOverwrite)>;

// ---------------------------------------------------------------------------
// Gateway events
// ---------------------------------------------------------------------------

/// A member's voice connection moved: joined, left, or switched channels.
///
/// `before`/`after` are the channel the member was in before and after the
/// transition; `None` means "not connected".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceStateUpdate {
    pub member: Member,
    #[serde(default)]
    pub before: Option<ChannelId>,
    #[serde(default)]
    pub after: Option<ChannelId>,
}

impl VoiceStateUpdate {
    /// The channel the member left, if this update moved them out of one.
    ///
    /// Mute/deafen toggles arrive with `before == after` and are not a leave.
    pub fn left(&self) -> Option<ChannelId> {
        match self.before {
            Some(before) if self.after != Some(before) => Some(before),
            _ => None,
        }
    }

    /// The channel the member entered, if this update moved them into one.
    pub fn joined(&self) -> Option<ChannelId> {
        match self.after {
            Some(after) if self.before != Some(after) => Some(after),
            _ => None,
        }
    }
}

/// Discriminant of a [`GatewayEvent`], used to subscribe handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    VoiceStateUpdate,
    MemberRemove,
    MemberBan,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VoiceStateUpdate => write!(f, "voice_state_update"),
            Self::MemberRemove => write!(f, "member_remove"),
            Self::MemberBan => write!(f, "member_ban"),
        }
    }
}

/// An event delivered by the platform gateway.
///
/// Internally tagged on the wire:
///
/// ```json
/// { "type": "member_ban", "guild_id": 1, "user_id": 42 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// A member's voice connection changed.
    VoiceStateUpdate(VoiceStateUpdate),

    /// A member left the guild (voluntarily or kicked). The snapshot still
    /// carries the voice channel they were in at the time.
    MemberRemove { member: Member },

    /// A user was banned from the guild. Only ids are delivered; the
    /// member's voice channel has to be looked up.
    MemberBan { guild_id: GuildId, user_id: UserId },
}

impl GatewayEvent {
    /// Returns which kind of event this is.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::VoiceStateUpdate(_) => EventKind::VoiceStateUpdate,
            Self::MemberRemove { .. } => EventKind::MemberRemove,
            Self::MemberBan { .. } => EventKind::MemberBan,
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// The value of a single slash-command option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandValue {
    Integer(i64),
    String(String),
}

/// A named slash-command option, e.g. `limit = 10`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOption {
    pub name: String,
    pub value: CommandValue,
}

/// A slash command invoked by a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInvocation {
    /// The command name, without the leading slash.
    pub name: String,
    /// The member who invoked the command.
    pub caller: Member,
    #[serde(default)]
    pub options: Vec<CommandOption>,
}

impl CommandInvocation {
    /// Creates an invocation with no options.
    pub fn new(name: impl Into<String>, caller: Member) -> Self {
        Self {
            name: name.into(),
            caller,
            options: Vec::new(),
        }
    }

    /// Adds an option and returns the invocation.
    pub fn with_option(mut self, name: impl Into<String>, value: CommandValue) -> Self {
        self.options.push(CommandOption {
            name: name.into(),
            value,
        });
        self
    }

    /// Looks up an option by name.
    pub fn option(&self, name: &str) -> Option<&CommandValue> {
        self.options
            .iter()
            .find(|opt| opt.name == name)
            .map(|opt| &opt.value)
    }

    /// Checks the invocation against the rules the payload format cannot
    /// express on its own.
    ///
    /// A command name must contain something other than whitespace and must
    /// not carry the leading slash.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ProtocolError::InvalidMessage(
                "command name is empty".to_string(),
            ));
        }
        if name.starts_with('/') {
            return Err(ProtocolError::InvalidMessage(format!(
                "command name `{name}` must not include the leading slash"
            )));
        }
        Ok(())
    }
}

/// The outcome of a command, handed back to the gateway for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandReply {
    pub ok: bool,
    pub message: String,
}

impl CommandReply {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
