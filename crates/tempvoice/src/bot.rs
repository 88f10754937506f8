//! `TempVoice` builder and gateway wiring.
//!
//! Ties the layers together: configuration → registry → lifecycle manager
//! and room commands → gateway subscriptions.

use std::path::Path;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tempvoice_commands::{Command, RoomCommands};
use tempvoice_protocol::{CommandInvocation, CommandReply, EventKind, GatewayEvent};
use tempvoice_room::{LifecycleManager, Provisioner, RoomRegistry};

use crate::{BotConfig, Gateway, TempVoiceError};

/// Every event kind the lifecycle manager reacts to.
const LIFECYCLE_EVENTS: [EventKind; 3] = [
    EventKind::VoiceStateUpdate,
    EventKind::MemberRemove,
    EventKind::MemberBan,
];

/// Builder for configuring a [`TempVoice`] bot.
///
/// The provisioner type is only fixed by [`build`](Self::build).
///
/// # Example
///
/// ```rust
/// use tempvoice::prelude::*;
///
/// let bot = TempVoiceBuilder::new()
///     .settle_delay_ms(500)
///     .build(MemoryProvisioner::new(UserId(1)));
/// assert_eq!(bot.lifecycle().settle().delay().as_millis(), 500);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TempVoiceBuilder {
    config: BotConfig,
}

impl TempVoiceBuilder {
    /// Creates a builder with no lobbies and the default settle delay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the whole configuration.
    pub fn config(mut self, config: BotConfig) -> Self {
        self.config = config;
        self
    }

    /// Loads the configuration from a TOML file.
    pub fn config_file<P: AsRef<Path>>(self, path: P) -> Result<Self, TempVoiceError> {
        Ok(self.config(BotConfig::load(path)?))
    }

    /// Overrides the settle delay, in milliseconds.
    pub fn settle_delay_ms(mut self, millis: u64) -> Self {
        self.config.lifecycle.settle_delay_ms = millis;
        self
    }

    /// Builds the bot on top of `provisioner`.
    ///
    /// Configuration problems are logged as warnings, not rejected: a lobby
    /// with no category just never produces rooms.
    pub fn build<P: Provisioner>(self, provisioner: P) -> TempVoice<P> {
        let BotConfig { lobbies, lifecycle } = self.config;
        for problem in lobbies.validate() {
            tracing::warn!(%problem, "lobby configuration problem");
        }
        tracing::info!(
            lobbies = lobbies.lobby_channels.len(),
            settle_delay_ms = lifecycle.settle_delay_ms,
            "tempvoice configured"
        );

        let registry = Arc::new(RoomRegistry::new());
        let provisioner = Arc::new(provisioner);
        TempVoice {
            lifecycle: LifecycleManager::new(
                Arc::clone(&registry),
                Arc::clone(&provisioner),
                lobbies,
                lifecycle,
            ),
            commands: RoomCommands::new(Arc::clone(&registry), Arc::clone(&provisioner)),
            registry,
            provisioner,
        }
    }
}

/// A configured bot: the shared room registry plus the components that
/// read and write it.
pub struct TempVoice<P: Provisioner> {
    registry: Arc<RoomRegistry>,
    provisioner: Arc<P>,
    lifecycle: LifecycleManager<P>,
    commands: RoomCommands<P>,
}

impl<P: Provisioner> TempVoice<P> {
    /// Subscribes the lifecycle manager to its events and registers every
    /// room command.
    pub fn install(&self, gateway: &mut impl Gateway) {
        for kind in LIFECYCLE_EVENTS {
            let lifecycle = self.lifecycle.clone();
            gateway.subscribe(
                kind,
                Arc::new(move |event: GatewayEvent| -> BoxFuture<'static, ()> {
                    let lifecycle = lifecycle.clone();
                    async move { lifecycle.handle_event(event).await }.boxed()
                }),
            );
        }

        for name in Command::NAMES {
            let commands = self.commands.clone();
            gateway.register_command(
                name,
                Arc::new(move |invocation: CommandInvocation| -> BoxFuture<'static, CommandReply> {
                    let commands = commands.clone();
                    async move { commands.execute(&invocation).await }.boxed()
                }),
            );
        }

        tracing::info!(
            events = LIFECYCLE_EVENTS.len(),
            commands = Command::NAMES.len(),
            "tempvoice installed on gateway"
        );
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    pub fn provisioner(&self) -> &Arc<P> {
        &self.provisioner
    }

    pub fn lifecycle(&self) -> &LifecycleManager<P> {
        &self.lifecycle
    }

    pub fn commands(&self) -> &RoomCommands<P> {
        &self.commands
    }

    /// Disarms pending settle checks. Managed rooms are left in place.
    pub fn shutdown(&self) {
        self.lifecycle.shutdown();
    }
}
