//! Executes room commands against the registry and the provisioner.

use std::sync::Arc;

use tempvoice_protocol::{
    ChannelId, CommandInvocation, CommandReply, Member, OverwriteTarget, PermissionOverwrite,
};
use tempvoice_room::{Provisioner, RoomRegistry};

use crate::{Command, CommandError, PrivacyMode};

/// Longest room name accepted by `/setname`, in characters.
pub const MAX_NAME_CHARS: usize = 50;

/// Highest participant cap accepted by `/setlimit`. 0 means unlimited.
pub const MAX_USER_LIMIT: i64 = 99;

/// Runs member commands on the caller's own room.
///
/// Shares the registry with the lifecycle manager but only reads it.
pub struct RoomCommands<P: Provisioner> {
    registry: Arc<RoomRegistry>,
    provisioner: Arc<P>,
}

impl<P: Provisioner> Clone for RoomCommands<P> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            provisioner: Arc::clone(&self.provisioner),
        }
    }
}

impl<P: Provisioner> RoomCommands<P> {
    pub fn new(registry: Arc<RoomRegistry>, provisioner: Arc<P>) -> Self {
        Self {
            registry,
            provisioner,
        }
    }

    /// Parses and runs an invocation, turning every outcome into a reply.
    ///
    /// Never fails: errors become failure replies for the caller.
    pub async fn execute(&self, invocation: &CommandInvocation) -> CommandReply {
        let caller = &invocation.caller;
        let result = match Command::parse(invocation) {
            Ok(command) => self.run(caller, command).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(message) => {
                tracing::debug!(command = %invocation.name, user_id = %caller.id, "command succeeded");
                CommandReply::success(message)
            }
            Err(e) => {
                match &e {
                    CommandError::PermissionDenied(reason) => tracing::warn!(
                        command = %invocation.name,
                        user_id = %caller.id,
                        %reason,
                        "command blocked by missing permissions"
                    ),
                    CommandError::Unexpected(reason) => tracing::error!(
                        command = %invocation.name,
                        user_id = %caller.id,
                        %reason,
                        "command failed"
                    ),
                    other if other.is_validation() => tracing::debug!(
                        command = %invocation.name,
                        user_id = %caller.id,
                        error = %other,
                        "command input rejected"
                    ),
                    other => tracing::info!(
                        command = %invocation.name,
                        user_id = %caller.id,
                        error = %other,
                        "command refused"
                    ),
                }
                CommandReply::failure(e.to_string())
            }
        }
    }

    /// Runs a parsed command and returns the success message.
    pub async fn run(&self, caller: &Member, command: Command) -> Result<String, CommandError> {
        tracing::trace!(command = command.name(), user_id = %caller.id, "running command");
        match command {
            Command::SetName { name } => {
                self.rename(caller, &name).await?;
                Ok(format!("Your room is now called \"{name}\""))
            }
            Command::SetLimit { limit } => {
                let limit = self.set_limit(caller, limit).await?;
                Ok(match limit {
                    0 => "Participant limit removed".to_string(),
                    n => format!("Room limited to {n} participants"),
                })
            }
            Command::Private { mode } => Ok(match self.set_privacy(caller, &mode).await? {
                PrivacyMode::On => "Room is now private. Invite members to let them in".to_string(),
                PrivacyMode::Off => "Room is now public".to_string(),
            }),
            Command::Help => Ok(self.help()),
            Command::Ping => Ok(self.ping()),
        }
    }

    /// The managed room the caller is connected to.
    ///
    /// # Errors
    /// [`CommandError::NotInOwnRoom`] if the caller is not in voice or
    /// their channel is not a managed room.
    pub fn resolve_room(&self, caller: &Member) -> Result<ChannelId, CommandError> {
        caller
            .voice_channel
            .filter(|channel| self.registry.is_managed(*channel))
            .ok_or(CommandError::NotInOwnRoom)
    }

    /// Renames the caller's room. The name must be 1 to 50 characters.
    pub async fn rename(&self, caller: &Member, name: &str) -> Result<(), CommandError> {
        let channel_id = self.resolve_room(caller)?;
        let chars = name.chars().count();
        if !(1..=MAX_NAME_CHARS).contains(&chars) {
            return Err(CommandError::InvalidName(chars));
        }

        self.provisioner
            .rename_channel(channel_id, name.to_string())
            .await?;
        tracing::info!(%channel_id, user_id = %caller.id, name, "room renamed");
        Ok(())
    }

    /// Caps the number of participants in the caller's room.
    ///
    /// Accepts 0 to 99 inclusive and returns the applied limit.
    pub async fn set_limit(&self, caller: &Member, limit: i64) -> Result<u32, CommandError> {
        let channel_id = self.resolve_room(caller)?;
        let applied = u32::try_from(limit)
            .ok()
            .filter(|n| i64::from(*n) <= MAX_USER_LIMIT)
            .ok_or(CommandError::InvalidLimit(limit))?;

        self.provisioner.set_user_limit(channel_id, applied).await?;
        tracing::info!(%channel_id, user_id = %caller.id, limit = applied, "room limit set");
        Ok(applied)
    }

    /// Switches the caller's room between invite-only and public.
    ///
    /// `on` denies connect to the default role (the room stays visible)
    /// and grants the caller connect, view and manage. `off` removes the
    /// default role's overwrite so access is inherited again.
    pub async fn set_privacy(&self, caller: &Member, mode: &str) -> Result<PrivacyMode, CommandError> {
        let channel_id = self.resolve_room(caller)?;
        let mode: PrivacyMode = mode.parse()?;

        match mode {
            PrivacyMode::On => {
                self.provisioner
                    .set_permission_overwrite(
                        channel_id,
                        OverwriteTarget::DefaultRole,
                        Some(PermissionOverwrite {
                            connect: Some(false),
                            view_channel: Some(true),
                            ..PermissionOverwrite::default()
                        }),
                    )
                    .await?;
                self.provisioner
                    .set_permission_overwrite(
                        channel_id,
                        OverwriteTarget::Member(caller.id),
                        Some(PermissionOverwrite {
                            connect: Some(true),
                            view_channel: Some(true),
                            manage_channels: Some(true),
                            manage_roles: None,
                        }),
                    )
                    .await?;
            }
            PrivacyMode::Off => {
                self.provisioner
                    .set_permission_overwrite(channel_id, OverwriteTarget::DefaultRole, None)
                    .await?;
            }
        }
        tracing::info!(%channel_id, user_id = %caller.id, %mode, "room privacy changed");
        Ok(mode)
    }

    /// Lists the available commands.
    pub fn help(&self) -> String {
        let mut text = String::from("Room commands (use them from inside your room):");
        for usage in Command::NAMES.iter().filter_map(|name| Command::usage(name)) {
            text.push('\n');
            text.push_str(usage);
        }
        text
    }

    /// Liveness check with the number of active rooms.
    pub fn ping(&self) -> String {
        format!("pong, {} active rooms", self.registry.len())
    }
}
