//! # tempvoice
//!
//! Temporary voice rooms for chat platforms. Members join a lobby channel,
//! the bot creates a room for them, moves them in, and deletes the room
//! once everyone has left.
//!
//! The platform is reached through two seams: a [`Provisioner`] performs
//! channel mutations, and a [`Gateway`] delivers events and command
//! invocations. [`EventBus`] is an in-process gateway.
//!
//! ## Quick Start
//!
//! ```rust
//! use tempvoice::prelude::*;
//!
//! # fn main() -> Result<(), TempVoiceError> {
//! let config = BotConfig::from_toml_str(
//!     r#"
//!     [lobbies.lobby_channels]
//!     games = 1100
//!
//!     [lobbies.category_ids]
//!     games = 2200
//!     "#,
//! )?;
//!
//! let bot = TempVoiceBuilder::new()
//!     .config(config)
//!     .build(MemoryProvisioner::new(UserId(1)));
//!
//! let mut bus = EventBus::new();
//! bot.install(&mut bus);
//! assert_eq!(bus.subscriber_count(EventKind::VoiceStateUpdate), 1);
//! assert!(bot.lifecycle().lobbies().is_lobby(ChannelId(1100)));
//! # Ok(())
//! # }
//! ```

mod bot;
mod config;
mod error;
mod gateway;

pub use bot::{TempVoice, TempVoiceBuilder};
pub use config::{BotConfig, ConfigError};
pub use error::TempVoiceError;
pub use gateway::{CommandHandler, EventBus, EventHandler, Gateway};
pub use tempvoice_room::Provisioner;

pub mod prelude {
    pub use crate::{
        BotConfig, CommandHandler, ConfigError, EventBus, EventHandler, Gateway, TempVoice,
        TempVoiceBuilder, TempVoiceError,
    };
    pub use tempvoice_commands::{Command, CommandError, PrivacyMode, RoomCommands};
    pub use tempvoice_protocol::{
        ChannelId, Codec, CommandInvocation, CommandOption, CommandReply, CommandValue, EventKind,
        GatewayEvent, GuildId, JsonCodec, Member, OverwriteTarget, PermissionOverwrite, UserId,
        VoiceStateUpdate,
    };
    pub use tempvoice_room::{
        DeletionOutcome, LifecycleConfig, LifecycleManager, LobbyConfig, ManagedRoom,
        MemoryProvisioner, ProvisionError, Provisioner, RoomError, RoomRegistry,
    };
}
