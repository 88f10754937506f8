//! An in-process [`Provisioner`] backed by plain maps.
//!
//! `MemoryProvisioner` plays both sides of the platform boundary: it
//! implements the provisioner operations the bot calls, and it exposes
//! "platform" helpers ([`connect`](MemoryProvisioner::connect),
//! [`disconnect`](MemoryProvisioner::disconnect), ...) that mutate the
//! simulated guild and return the gateway event the platform would emit.
//!
//! Every provisioner call suspends once before touching state, so
//! concurrent handlers interleave the way they would against a network.
//! Faults can be queued per operation to exercise error paths.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;
use tempvoice_protocol::{
    ChannelId, Member, OverwriteTarget, PermissionOverwrite, UserId, VoiceStateUpdate,
};

use crate::{ProvisionError, Provisioner, VoiceChannelSpec};

/// First id handed out to channels created through the provisioner.
const FIRST_CREATED_ID: u64 = 10_000;

/// The provisioner operations, for fault injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProvisionOp {
    CategoryExists,
    Create,
    Delete,
    Move,
    MemberCount,
    MemberChannel,
    Rename,
    SetUserLimit,
    SetOverwrite,
}

/// A voice channel in the simulated guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryChannel {
    pub id: ChannelId,
    pub name: String,
    pub category: Option<ChannelId>,
    pub user_limit: u32,
    pub overwrites: BTreeMap<OverwriteKey, PermissionOverwrite>,
}

/// Ordered key for [`MemoryChannel::overwrites`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OverwriteKey {
    DefaultRole,
    Member(UserId),
}

impl From<OverwriteTarget> for OverwriteKey {
    fn from(target: OverwriteTarget) -> Self {
        match target {
            OverwriteTarget::DefaultRole => Self::DefaultRole,
            OverwriteTarget::Member(user) => Self::Member(user),
        }
    }
}

impl MemoryChannel {
    /// The overwrite for `target`, if one is set.
    pub fn overwrite(&self, target: OverwriteTarget) -> Option<&PermissionOverwrite> {
        self.overwrites.get(&OverwriteKey::from(target))
    }
}

#[derive(Debug, Default)]
struct GuildState {
    categories: HashSet<ChannelId>,
    channels: HashMap<ChannelId, MemoryChannel>,
    locations: HashMap<UserId, ChannelId>,
    next_id: u64,
    faults: HashMap<ProvisionOp, VecDeque<ProvisionError>>,
    calls: HashMap<ProvisionOp, usize>,
}

impl GuildState {
    /// Records the call and pops a queued fault, if any.
    fn enter(&mut self, op: ProvisionOp) -> Result<(), ProvisionError> {
        *self.calls.entry(op).or_default() += 1;
        match self.faults.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn channel_mut(&mut self, channel: ChannelId) -> Result<&mut MemoryChannel, ProvisionError> {
        self.channels
            .get_mut(&channel)
            .ok_or(ProvisionError::NotFound(channel))
    }

    fn occupancy(&self, channel: ChannelId) -> usize {
        self.locations.values().filter(|c| **c == channel).count()
    }
}

/// A simulated guild implementing [`Provisioner`].
#[derive(Debug)]
pub struct MemoryProvisioner {
    bot_user: UserId,
    latency: Option<Duration>,
    state: Mutex<GuildState>,
}

impl MemoryProvisioner {
    /// Creates an empty guild operated by `bot_user`.
    pub fn new(bot_user: UserId) -> Self {
        Self {
            bot_user,
            latency: None,
            state: Mutex::new(GuildState {
                next_id: FIRST_CREATED_ID,
                ..GuildState::default()
            }),
        }
    }

    /// Makes every provisioner call take `latency` instead of a bare yield.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    // -- Platform side ----------------------------------------------------

    /// Adds a category that rooms can be created under.
    pub fn add_category(&self, category: ChannelId) {
        self.state.lock().categories.insert(category);
    }

    /// Adds a pre-existing voice channel (a lobby, for example).
    pub fn add_voice_channel(&self, id: ChannelId, name: impl Into<String>) {
        self.state.lock().channels.insert(
            id,
            MemoryChannel {
                id,
                name: name.into(),
                category: None,
                user_limit: 0,
                overwrites: BTreeMap::new(),
            },
        );
    }

    /// Connects (or moves) a member to `channel` and returns the event the
    /// gateway would deliver. The member snapshot in the event reflects
    /// the new location.
    pub fn connect(&self, member: &Member, channel: ChannelId) -> VoiceStateUpdate {
        let before = self.state.lock().locations.insert(member.id, channel);
        VoiceStateUpdate {
            member: member.clone().in_channel(channel),
            before,
            after: Some(channel),
        }
    }

    /// Disconnects a member from voice and returns the gateway event.
    pub fn disconnect(&self, member: &Member) -> VoiceStateUpdate {
        let before = self.state.lock().locations.remove(&member.id);
        let mut snapshot = member.clone();
        snapshot.voice_channel = None;
        VoiceStateUpdate {
            member: snapshot,
            before,
            after: None,
        }
    }

    /// Deletes a channel behind the bot's back (a moderator, another bot).
    pub fn remove_channel(&self, channel: ChannelId) {
        let mut state = self.state.lock();
        state.channels.remove(&channel);
        state.locations.retain(|_, c| *c != channel);
    }

    /// Queues a failure for the next call of `op`.
    pub fn fail_next(&self, op: ProvisionOp, err: ProvisionError) {
        self.state
            .lock()
            .faults
            .entry(op)
            .or_default()
            .push_back(err);
    }

    // -- Inspection -------------------------------------------------------

    pub fn channel(&self, channel: ChannelId) -> Option<MemoryChannel> {
        self.state.lock().channels.get(&channel).cloned()
    }

    /// Channels currently under `category`.
    pub fn channels_in(&self, category: ChannelId) -> Vec<MemoryChannel> {
        let state = self.state.lock();
        let mut channels: Vec<_> = state
            .channels
            .values()
            .filter(|c| c.category == Some(category))
            .cloned()
            .collect();
        channels.sort_by_key(|c| c.id);
        channels
    }

    /// The channel `user` is connected to, read synchronously.
    pub fn location(&self, user: UserId) -> Option<ChannelId> {
        self.state.lock().locations.get(&user).copied()
    }

    pub fn occupancy(&self, channel: ChannelId) -> usize {
        self.state.lock().occupancy(channel)
    }

    /// How many times `op` has been called (including injected failures).
    pub fn calls(&self, op: ProvisionOp) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    async fn suspend(&self) {
        match self.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }
    }
}

impl Provisioner for MemoryProvisioner {
    fn bot_user_id(&self) -> UserId {
        self.bot_user
    }

    async fn category_exists(&self, category: ChannelId) -> Result<bool, ProvisionError> {
        self.suspend().await;
        let mut state = self.state.lock();
        state.enter(ProvisionOp::CategoryExists)?;
        Ok(state.categories.contains(&category))
    }

    async fn create_voice_channel(&self, spec: VoiceChannelSpec) -> Result<ChannelId, ProvisionError> {
        self.suspend().await;
        let mut state = self.state.lock();
        state.enter(ProvisionOp::Create)?;
        if !state.categories.contains(&spec.category) {
            return Err(ProvisionError::NotFound(spec.category));
        }

        let id = ChannelId(state.next_id);
        state.next_id += 1;
        let overwrites = spec
            .access
            .into_iter()
            .map(|(target, overwrite)| (OverwriteKey::from(target), overwrite))
            .collect();
        state.channels.insert(
            id,
            MemoryChannel {
                id,
                name: spec.name,
                category: Some(spec.category),
                user_limit: spec.user_limit,
                overwrites,
            },
        );
        Ok(id)
    }

    async fn delete_channel(&self, channel: ChannelId) -> Result<(), ProvisionError> {
        self.suspend().await;
        let mut state = self.state.lock();
        state.enter(ProvisionOp::Delete)?;
        state
            .channels
            .remove(&channel)
            .ok_or(ProvisionError::NotFound(channel))?;
        state.locations.retain(|_, c| *c != channel);
        Ok(())
    }

    async fn move_member(&self, user: UserId, channel: ChannelId) -> Result<(), ProvisionError> {
        self.suspend().await;
        let mut state = self.state.lock();
        state.enter(ProvisionOp::Move)?;
        if !state.channels.contains_key(&channel) {
            return Err(ProvisionError::NotFound(channel));
        }
        match state.locations.get_mut(&user) {
            Some(location) => {
                *location = channel;
                Ok(())
            }
            None => Err(ProvisionError::Unexpected(format!(
                "member {user} is not connected to voice"
            ))),
        }
    }

    async fn member_count(&self, channel: ChannelId) -> Result<usize, ProvisionError> {
        self.suspend().await;
        let mut state = self.state.lock();
        state.enter(ProvisionOp::MemberCount)?;
        if !state.channels.contains_key(&channel) {
            return Err(ProvisionError::NotFound(channel));
        }
        Ok(state.occupancy(channel))
    }

    async fn member_channel(&self, user: UserId) -> Result<Option<ChannelId>, ProvisionError> {
        self.suspend().await;
        let mut state = self.state.lock();
        state.enter(ProvisionOp::MemberChannel)?;
        Ok(state.locations.get(&user).copied())
    }

    async fn rename_channel(&self, channel: ChannelId, name: String) -> Result<(), ProvisionError> {
        self.suspend().await;
        let mut state = self.state.lock();
        state.enter(ProvisionOp::Rename)?;
        state.channel_mut(channel)?.name = name;
        Ok(())
    }

    async fn set_user_limit(&self, channel: ChannelId, limit: u32) -> Result<(), ProvisionError> {
        self.suspend().await;
        let mut state = self.state.lock();
        state.enter(ProvisionOp::SetUserLimit)?;
        state.channel_mut(channel)?.user_limit = limit;
        Ok(())
    }

    async fn set_permission_overwrite(
        &self,
        channel: ChannelId,
        target: OverwriteTarget,
        overwrite: Option<PermissionOverwrite>,
    ) -> Result<(), ProvisionError> {
        self.suspend().await;
        let mut state = self.state.lock();
        state.enter(ProvisionOp::SetOverwrite)?;
        let overwrites = &mut state.channel_mut(channel)?.overwrites;
        let key = OverwriteKey::from(target);
        match overwrite.filter(|o| !o.is_empty()) {
            Some(overwrite) => {
                overwrites.insert(key, overwrite);
            }
            None => {
                overwrites.remove(&key);
            }
        }
        Ok(())
    }
}
