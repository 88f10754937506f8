//! Gateway-facing types for tempvoice.
//!
//! This crate defines everything that crosses the boundary between the
//! chat-platform gateway and the bot:
//!
//! - **Types** ([`GatewayEvent`], [`Member`], [`CommandInvocation`], etc.):
//!   the events and command envelopes the gateway delivers, plus the
//!   permission model used when provisioning channels.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those values are
//!   converted to/from bytes when the gateway lives in another process.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer doesn't know about rooms or the registry. It only
//! describes what happened on the platform and what the bot was asked to do.
//!
//! ```text
//! Gateway (platform) → Protocol (GatewayEvent) → Room layer (lifecycle)
//!                    → Protocol (CommandInvocation) → Command layer
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    AccessRules, ChannelId, CommandInvocation, CommandOption, CommandReply,
    CommandValue, EventKind, GatewayEvent, GuildId, Member, OverwriteTarget,
    PermissionOverwrite, UserId, VoiceStateUpdate,
};
