//! The room registry: which channels are bot-managed temporary rooms.
//!
//! # Concurrency note
//!
//! Many event handlers can be in flight at once, interleaved at every
//! provisioner call. The registry therefore only offers single-key
//! operations, each atomic on its own (`DashMap`/`DashSet` shard locks),
//! and every mutation is idempotent. There is no multi-step transaction
//! and no lock held across an `.await`.

use std::time::Instant;

use dashmap::{DashMap, DashSet};
use tempvoice_protocol::{ChannelId, UserId};

/// A temporary room the lifecycle manager created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedRoom {
    pub channel_id: ChannelId,
    /// Tag of the lobby that spawned the room.
    pub lobby: String,
    /// The member the room was created for.
    pub owner: UserId,
    /// Diagnostics only; nothing expires rooms by age.
    pub created_at: Instant,
}

impl ManagedRoom {
    pub fn new(channel_id: ChannelId, lobby: impl Into<String>, owner: UserId) -> Self {
        Self {
            channel_id,
            lobby: lobby.into(),
            owner,
            created_at: Instant::now(),
        }
    }
}

/// Process-wide set of managed rooms plus the set of rooms mid-deletion.
///
/// Invariant: a channel id is managed iff it was registered after a
/// successful creation and has not been unregistered since. Nothing is
/// persisted; a restart forgets every room.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<ChannelId, ManagedRoom>,
    pending: DashSet<ChannelId>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a room. Idempotent: registering an id that is
    /// already managed keeps the original record.
    ///
    /// Returns `true` if the room was newly registered.
    pub fn register(&self, room: ManagedRoom) -> bool {
        let channel_id = room.channel_id;
        let mut inserted = false;
        self.rooms.entry(channel_id).or_insert_with(|| {
            inserted = true;
            room
        });
        if inserted {
            tracing::debug!(%channel_id, "room registered");
        }
        inserted
    }

    /// Stops tracking a room and drops any pending-deletion mark.
    /// Idempotent; unregistering an unknown id is a no-op.
    pub fn unregister(&self, channel_id: ChannelId) -> Option<ManagedRoom> {
        self.pending.remove(&channel_id);
        let removed = self.rooms.remove(&channel_id).map(|(_, room)| room);
        if removed.is_some() {
            tracing::debug!(%channel_id, "room unregistered");
        }
        removed
    }

    pub fn is_managed(&self, channel_id: ChannelId) -> bool {
        self.rooms.contains_key(&channel_id)
    }

    /// Returns a copy of the room record, if managed.
    pub fn get(&self, channel_id: ChannelId) -> Option<ManagedRoom> {
        self.rooms.get(&channel_id).map(|entry| entry.value().clone())
    }

    /// Marks a channel as mid-deletion.
    ///
    /// Returns `true` if the mark is new. `false` means another task is
    /// already deleting this channel and the caller must back off.
    pub fn mark_pending_deletion(&self, channel_id: ChannelId) -> bool {
        self.pending.insert(channel_id)
    }

    pub fn clear_pending_deletion(&self, channel_id: ChannelId) {
        self.pending.remove(&channel_id);
    }

    pub fn is_pending_deletion(&self, channel_id: ChannelId) -> bool {
        self.pending.contains(&channel_id)
    }

    /// Marks a channel as mid-deletion and returns a guard that clears the
    /// mark when dropped, or `None` if the channel is already pending.
    pub fn begin_deletion(&self, channel_id: ChannelId) -> Option<DeletionGuard<'_>> {
        self.mark_pending_deletion(channel_id).then(|| DeletionGuard {
            registry: self,
            channel_id,
        })
    }

    /// Number of managed rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Number of rooms currently mid-deletion.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Ids of all managed rooms, in no particular order.
    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.rooms.iter().map(|entry| *entry.key()).collect()
    }
}

/// Holds a channel's pending-deletion mark for the duration of one
/// deletion attempt.
///
/// Dropping the guard clears the mark, whichever way the attempt ends:
/// success, failure, early return, or the owning task being dropped.
#[derive(Debug)]
pub struct DeletionGuard<'a> {
    registry: &'a RoomRegistry,
    channel_id: ChannelId,
}

impl Drop for DeletionGuard<'_> {
    fn drop(&mut self) {
        self.registry.clear_pending_deletion(self.channel_id);
    }
}
