//! Lifecycle manager: creates rooms on lobby joins, deletes them once empty.
//!
//! Per-channel state machine, driven by gateway events:
//!
//! ```text
//!  Unmanaged ──(lobby join, create ok)──→ Managed
//!  Managed ──(leave, settle delay, empty)──→ PendingDeletion ──→ Unmanaged
//!  Managed ──(owner leaves guild / banned, empty)──→ PendingDeletion ──→ Unmanaged
//!  PendingDeletion ──(permission denied / other failure)──→ Managed
//! ```
//!
//! Handlers never return errors to the event loop. Every failure is logged
//! here and the event is considered handled; a later event for the same
//! channel is the retry opportunity.
//!
//! # Deletion triggers
//!
//! Three events can end a room, and all of them funnel into
//! [`LifecycleManager::delete_if_empty`]:
//!
//! - A member leaving a managed room arms a settle check on the
//!   [`SettleScheduler`]. If nobody joins before the delay elapses, the
//!   check asks the platform for the member count and deletes the room
//!   when it is zero. A join into the room disarms the check.
//! - A member leaving the guild or being banned checks their room at once,
//!   without waiting for the settle delay.
//!
//! `delete_if_empty` claims the registry's pending-deletion mark before
//! its first platform call. Whichever trigger claims it first does the
//! work; a concurrent trigger for the same channel sees
//! [`DeletionOutcome::AlreadyPending`] and returns. The mark is released
//! when the attempt ends, so a failed deletion leaves the room managed.
//!
//! # Last known room
//!
//! By the time a ban or departure reaches the bot, the platform has usually
//! torn down the member's voice connection already, so asking where they
//! are finds nothing. The manager therefore records the managed room each
//! member was last seen joining. The record survives a plain disconnect
//! and is dropped when the member moves to an unmanaged channel or the
//! room is deleted. Ban and departure handling prefers a live answer
//! from the platform and falls back to the record.

use std::sync::Arc;

use dashmap::DashMap;
use tempvoice_protocol::{
    AccessRules, ChannelId, GatewayEvent, GuildId, Member, OverwriteTarget, PermissionOverwrite,
    UserId, VoiceStateUpdate,
};

use crate::{
    LifecycleConfig, LobbyConfig, ManagedRoom, ProvisionError, Provisioner, RoomError,
    RoomRegistry, SettleScheduler, VoiceChannelSpec,
};

/// What a deletion attempt ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
    /// The channel is not (or no longer) a managed room.
    NotManaged,
    /// Another task is already deleting this channel.
    AlreadyPending,
    /// Members are still connected; nothing was deleted.
    Occupied(usize),
    /// The channel was deleted and unregistered.
    Deleted,
    /// The channel had already been deleted elsewhere; unregistered.
    AlreadyGone,
    /// Deletion failed; the room stays registered for a later retry.
    Retained,
}

/// Reacts to voice-presence events and keeps the [`RoomRegistry`] in sync
/// with the rooms that actually exist.
///
/// Cheap to clone: all state is shared behind `Arc`s, and clones drive the
/// same registry and settle timers.
pub struct LifecycleManager<P: Provisioner> {
    registry: Arc<RoomRegistry>,
    provisioner: Arc<P>,
    lobbies: Arc<LobbyConfig>,
    settle: SettleScheduler,
    /// Member → the managed room they were last seen in. Kept after a plain
    /// disconnect so a departure or ban that arrives after the platform
    /// tore the connection down can still find the room.
    last_rooms: Arc<DashMap<UserId, ChannelId>>,
}

impl<P: Provisioner> Clone for LifecycleManager<P> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            provisioner: Arc::clone(&self.provisioner),
            lobbies: Arc::clone(&self.lobbies),
            settle: self.settle.clone(),
            last_rooms: Arc::clone(&self.last_rooms),
        }
    }
}

impl<P: Provisioner> LifecycleManager<P> {
    pub fn new(
        registry: Arc<RoomRegistry>,
        provisioner: Arc<P>,
        lobbies: LobbyConfig,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            registry,
            provisioner,
            lobbies: Arc::new(lobbies),
            settle: SettleScheduler::new(config.settle_delay()),
            last_rooms: Arc::new(DashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    pub fn settle(&self) -> &SettleScheduler {
        &self.settle
    }

    pub fn lobbies(&self) -> &LobbyConfig {
        &self.lobbies
    }

    /// The managed room `user` was last seen in, if it still exists.
    pub fn last_room(&self, user: UserId) -> Option<ChannelId> {
        self.last_rooms
            .get(&user)
            .map(|entry| *entry)
            .filter(|channel| self.registry.is_managed(*channel))
    }

    /// Routes a gateway event to the matching handler.
    pub async fn handle_event(&self, event: GatewayEvent) {
        tracing::trace!(kind = %event.kind(), "lifecycle event");
        match event {
            GatewayEvent::VoiceStateUpdate(update) => self.on_voice_state_update(update).await,
            GatewayEvent::MemberRemove { member } => self.on_member_remove(member).await,
            GatewayEvent::MemberBan { guild_id, user_id } => {
                self.on_member_ban(guild_id, user_id).await
            }
        }
    }

    /// Handles a member's voice connection moving.
    ///
    /// Joining a lobby creates a room. Joining a managed room disarms its
    /// pending settle check. Leaving a managed room arms one.
    pub async fn on_voice_state_update(&self, update: VoiceStateUpdate) {
        if let Some(joined) = update.joined() {
            if self.registry.is_managed(joined) {
                self.last_rooms.insert(update.member.id, joined);
                if self.settle.cancel(joined) {
                    tracing::debug!(channel_id = %joined, "member rejoined, settle check dropped");
                }
            } else {
                self.last_rooms.remove(&update.member.id);
            }
            if let Some(tag) = self.lobbies.lobby_tag(joined) {
                tracing::info!(
                    user_id = %update.member.id,
                    lobby = tag,
                    "member joined lobby"
                );
                if let Err(e) = self.create_room(&update.member, tag).await {
                    log_create_failure(&e, update.member.id, tag);
                }
            }
        }

        if let Some(left) = update.left() {
            if self.registry.is_managed(left) {
                self.schedule_settle_check(left);
            }
        }
    }

    /// Handles a member leaving the guild. The room they were in is
    /// deleted right away when empty.
    ///
    /// The departure snapshot usually no longer carries a voice channel
    /// because the platform drops the connection first, so the member's
    /// last known room is used when the snapshot has none.
    pub async fn on_member_remove(&self, member: Member) {
        let recorded = self.last_rooms.remove(&member.id).map(|(_, channel)| channel);
        let Some(channel_id) = member
            .voice_channel
            .filter(|channel| self.registry.is_managed(*channel))
            .or(recorded.filter(|channel| self.registry.is_managed(*channel)))
        else {
            return;
        };
        tracing::info!(user_id = %member.id, %channel_id, "member left the guild from a room");
        self.delete_if_empty(channel_id).await;
    }

    /// Handles a ban. The event only names the user.
    ///
    /// The platform is asked where the user is connected. When it no longer
    /// knows (the connection was torn down with the ban) or the lookup
    /// fails, the user's last known room is used instead.
    pub async fn on_member_ban(&self, guild_id: GuildId, user_id: UserId) {
        let live = match self.provisioner.member_channel(user_id).await {
            Ok(channel) => channel,
            Err(e) => {
                tracing::warn!(%guild_id, %user_id, error = %e, "could not locate banned member");
                None
            }
        };
        let recorded = self.last_rooms.remove(&user_id).map(|(_, channel)| channel);
        let Some(channel_id) = live
            .filter(|channel| self.registry.is_managed(*channel))
            .or(recorded.filter(|channel| self.registry.is_managed(*channel)))
        else {
            return;
        };
        tracing::info!(%guild_id, %user_id, %channel_id, "member banned from a room");
        self.delete_if_empty(channel_id).await;
    }

    /// Creates a room for `member` from lobby `tag`, registers it, and
    /// moves the member in.
    ///
    /// A failed move is logged but the room is kept.
    ///
    /// # Errors
    /// - [`RoomError::Configuration`]: no category for the tag, or the
    ///   category does not exist on the server
    /// - [`RoomError::Provision`]: the provisioner refused the creation
    pub async fn create_room(&self, member: &Member, tag: &str) -> Result<ChannelId, RoomError> {
        let lobby = self.lobbies.resolve(tag)?;
        if !self.provisioner.category_exists(lobby.category).await? {
            return Err(RoomError::Configuration(format!(
                "category {} for lobby '{tag}' does not exist",
                lobby.category
            )));
        }

        let spec = VoiceChannelSpec {
            category: lobby.category,
            name: lobby.room_name(&member.display_name),
            user_limit: 0,
            access: initial_access(self.provisioner.bot_user_id(), member.id),
        };
        let name = spec.name.clone();
        let channel_id = self.provisioner.create_voice_channel(spec).await?;
        self.registry
            .register(ManagedRoom::new(channel_id, lobby.tag.as_str(), member.id));
        tracing::info!(
            %channel_id,
            name = %name,
            active_rooms = self.registry.len(),
            "room created"
        );

        match self.provisioner.move_member(member.id, channel_id).await {
            Ok(()) => {
                self.last_rooms.insert(member.id, channel_id);
                tracing::debug!(user_id = %member.id, %channel_id, "member moved into room")
            }
            Err(e) => tracing::warn!(
                user_id = %member.id,
                %channel_id,
                error = %e,
                "could not move member into new room"
            ),
        }
        Ok(channel_id)
    }

    /// Arms the settle check for a managed room someone just left.
    pub fn schedule_settle_check(&self, channel_id: ChannelId) {
        let manager = self.clone();
        self.settle.schedule(channel_id, move || async move {
            manager.delete_if_empty(channel_id).await;
        });
    }

    /// Deletes a managed room if nobody is connected to it.
    ///
    /// Both deletion triggers go through here, behind the registry's
    /// pending-deletion mark, so at most one attempt per channel is in
    /// flight at any time.
    pub async fn delete_if_empty(&self, channel_id: ChannelId) -> DeletionOutcome {
        if !self.registry.is_managed(channel_id) {
            return DeletionOutcome::NotManaged;
        }
        let Some(_guard) = self.registry.begin_deletion(channel_id) else {
            tracing::debug!(%channel_id, "deletion already in progress");
            return DeletionOutcome::AlreadyPending;
        };

        match self.provisioner.member_count(channel_id).await {
            Ok(0) => {}
            Ok(members) => {
                tracing::debug!(%channel_id, members, "room still occupied");
                return DeletionOutcome::Occupied(members);
            }
            Err(ProvisionError::NotFound(_)) => {
                self.forget(channel_id);
                tracing::debug!(%channel_id, "room already gone");
                return DeletionOutcome::AlreadyGone;
            }
            Err(e) => {
                tracing::error!(%channel_id, error = %e, "could not check room occupancy");
                return DeletionOutcome::Retained;
            }
        }

        match self.provisioner.delete_channel(channel_id).await {
            Ok(()) => {
                self.forget(channel_id);
                tracing::info!(
                    %channel_id,
                    active_rooms = self.registry.len(),
                    "empty room deleted"
                );
                DeletionOutcome::Deleted
            }
            Err(ProvisionError::NotFound(_)) => {
                self.forget(channel_id);
                tracing::debug!(%channel_id, "room already gone");
                DeletionOutcome::AlreadyGone
            }
            Err(ProvisionError::PermissionDenied(reason)) => {
                tracing::warn!(%channel_id, %reason, "missing permissions to delete room");
                DeletionOutcome::Retained
            }
            Err(e) => {
                tracing::error!(%channel_id, error = %e, "room deletion failed");
                DeletionOutcome::Retained
            }
        }
    }

    /// Drops every trace of a room that no longer exists: its registry
    /// entry, an armed settle check, and members' last-room records.
    fn forget(&self, channel_id: ChannelId) {
        self.registry.unregister(channel_id);
        self.settle.cancel(channel_id);
        self.last_rooms.retain(|_, channel| *channel != channel_id);
    }

    /// Disarms all pending settle checks. Rooms stay as they are.
    pub fn shutdown(&self) {
        self.settle.cancel_all();
        tracing::info!(active_rooms = self.registry.len(), "lifecycle manager stopped");
    }
}

/// Overwrites for a fresh room: public by default, the bot can manage it,
/// and the owner can administer their own room.
fn initial_access(bot: UserId, owner: UserId) -> AccessRules {
    vec![
        (
            OverwriteTarget::DefaultRole,
            PermissionOverwrite {
                view_channel: Some(true),
                connect: Some(true),
                ..PermissionOverwrite::default()
            },
        ),
        (
            OverwriteTarget::Member(bot),
            PermissionOverwrite {
                view_channel: Some(true),
                connect: Some(true),
                manage_channels: Some(true),
                manage_roles: Some(true),
            },
        ),
        (
            OverwriteTarget::Member(owner),
            PermissionOverwrite {
                view_channel: Some(true),
                connect: Some(true),
                manage_channels: Some(true),
                manage_roles: None,
            },
        ),
    ]
}

fn log_create_failure(err: &RoomError, user_id: UserId, lobby: &str) {
    match err {
        RoomError::Configuration(reason) => {
            tracing::warn!(%user_id, lobby, %reason, "room not created: configuration error")
        }
        RoomError::Provision(ProvisionError::PermissionDenied(reason)) => {
            tracing::warn!(%user_id, lobby, %reason, "missing permissions to create room")
        }
        other => tracing::error!(%user_id, lobby, error = %other, "room creation failed"),
    }
}
