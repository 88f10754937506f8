//! Integration tests for the room lifecycle against the in-memory guild.
//!
//! Time-dependent tests run with a paused clock, so waiting out the settle
//! delay is instant and deterministic.

use std::sync::Arc;
use std::time::Duration;

use tempvoice_protocol::{
    ChannelId, GatewayEvent, GuildId, Member, OverwriteTarget, UserId, VoiceStateUpdate,
};
use tempvoice_room::{
    DeletionOutcome, LifecycleConfig, LifecycleManager, LobbyConfig, MemoryProvisioner,
    ProvisionError, ProvisionOp, RoomRegistry,
};
use tokio::time;

// =========================================================================
// Helpers
// =========================================================================

const BOT: UserId = UserId(1);
const GUILD: GuildId = GuildId(500);
const LOBBY: ChannelId = ChannelId(100);
const CATEGORY: ChannelId = ChannelId(200);

/// Waits comfortably past the default 2s settle delay.
const PAST_SETTLE: Duration = Duration::from_secs(3);

struct Fixture {
    guild: Arc<MemoryProvisioner>,
    manager: LifecycleManager<MemoryProvisioner>,
}

impl Fixture {
    fn new() -> Self {
        Self::with_lobbies(
            LobbyConfig::default().with_lobby("Игры", LOBBY, CATEGORY, "Игровая {user}"),
        )
    }

    fn with_lobbies(lobbies: LobbyConfig) -> Self {
        Self::with_guild(MemoryProvisioner::new(BOT), lobbies)
    }

    fn with_guild(guild: MemoryProvisioner, lobbies: LobbyConfig) -> Self {
        let guild = Arc::new(guild);
        guild.add_category(CATEGORY);
        guild.add_voice_channel(LOBBY, "➕ Create room");
        let manager = LifecycleManager::new(
            Arc::new(RoomRegistry::new()),
            Arc::clone(&guild),
            lobbies,
            LifecycleConfig::default(),
        );
        Self { guild, manager }
    }

    fn registry(&self) -> &RoomRegistry {
        self.manager.registry()
    }

    /// Member joins the lobby; returns the room they ended up in.
    async fn join_lobby(&self, member: &Member) -> ChannelId {
        let update = self.guild.connect(member, LOBBY);
        self.manager.on_voice_state_update(update).await;
        self.guild.location(member.id).expect("member is connected")
    }

    async fn connect(&self, member: &Member, channel: ChannelId) {
        let update = self.guild.connect(member, channel);
        self.manager.on_voice_state_update(update).await;
    }

    async fn disconnect(&self, member: &Member) {
        let update = self.guild.disconnect(member);
        self.manager.on_voice_state_update(update).await;
    }
}

fn member(id: u64, name: &str) -> Member {
    Member::new(UserId(id), GUILD, name)
}

// =========================================================================
// Creation
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_lobby_join_creates_registers_and_moves() {
    let fx = Fixture::new();
    let alice = member(10, "alice");

    let room = fx.join_lobby(&alice).await;

    assert_ne!(room, LOBBY, "member should have been moved out of the lobby");
    let channel = fx.guild.channel(room).expect("room exists");
    assert_eq!(channel.name, "Игровая alice");
    assert_eq!(channel.category, Some(CATEGORY));
    assert_eq!(channel.user_limit, 0);
    assert!(fx.registry().is_managed(room));

    let record = fx.registry().get(room).unwrap();
    assert_eq!(record.lobby, "Игры");
    assert_eq!(record.owner, alice.id);
}

#[tokio::test(start_paused = true)]
async fn test_created_room_access_rules() {
    let fx = Fixture::new();
    let alice = member(10, "alice");

    let room = fx.join_lobby(&alice).await;
    let channel = fx.guild.channel(room).unwrap();

    let everyone = channel.overwrite(OverwriteTarget::DefaultRole).unwrap();
    assert_eq!(everyone.connect, Some(true));
    assert_eq!(everyone.view_channel, Some(true));

    let bot = channel.overwrite(OverwriteTarget::Member(BOT)).unwrap();
    assert_eq!(bot.manage_channels, Some(true));
    assert_eq!(bot.manage_roles, Some(true));

    let owner = channel.overwrite(OverwriteTarget::Member(alice.id)).unwrap();
    assert_eq!(owner.manage_channels, Some(true));
    assert_eq!(owner.connect, Some(true));
}

#[tokio::test(start_paused = true)]
async fn test_each_lobby_join_gets_a_fresh_room() {
    let fx = Fixture::new();
    let alice_room = fx.join_lobby(&member(10, "alice")).await;
    let bob_room = fx.join_lobby(&member(11, "bob")).await;

    assert_ne!(alice_room, bob_room);
    assert_eq!(fx.registry().len(), 2);
    assert_eq!(fx.guild.channels_in(CATEGORY).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_non_lobby_join_creates_nothing() {
    let fx = Fixture::new();
    fx.guild.add_voice_channel(ChannelId(300), "general");

    fx.connect(&member(10, "alice"), ChannelId(300)).await;

    assert_eq!(fx.guild.calls(ProvisionOp::Create), 0);
    assert!(fx.registry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_create_permission_denied_takes_no_action() {
    let fx = Fixture::new();
    fx.guild
        .fail_next(ProvisionOp::Create, ProvisionError::PermissionDenied("manage channels".into()));
    let alice = member(10, "alice");

    let location = fx.join_lobby(&alice).await;

    assert_eq!(location, LOBBY);
    assert!(fx.registry().is_empty());
    assert_eq!(fx.guild.calls(ProvisionOp::Create), 1);
    assert_eq!(fx.guild.calls(ProvisionOp::Move), 0);
}

#[tokio::test(start_paused = true)]
async fn test_lobby_without_category_is_ignored() {
    let mut lobbies = LobbyConfig::default();
    lobbies.lobby_channels.insert("Игры".into(), LOBBY);
    let fx = Fixture::with_lobbies(lobbies);

    fx.join_lobby(&member(10, "alice")).await;

    assert_eq!(fx.guild.calls(ProvisionOp::Create), 0);
    assert!(fx.registry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_category_missing_on_server_is_ignored() {
    let lobbies =
        LobbyConfig::default().with_lobby("Игры", LOBBY, ChannelId(999), "Игровая {user}");
    let fx = Fixture::with_lobbies(lobbies);

    fx.join_lobby(&member(10, "alice")).await;

    assert_eq!(fx.guild.calls(ProvisionOp::Create), 0);
    assert!(fx.registry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_move_failure_keeps_room() {
    let fx = Fixture::new();
    fx.guild
        .fail_next(ProvisionOp::Move, ProvisionError::Unexpected("gateway timeout".into()));
    let alice = member(10, "alice");

    let location = fx.join_lobby(&alice).await;

    assert_eq!(location, LOBBY);
    assert_eq!(fx.registry().len(), 1);
    assert_eq!(fx.guild.channels_in(CATEGORY).len(), 1);
}

// =========================================================================
// Settled deletion
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_last_member_leaving_deletes_room_after_settle_delay() {
    let fx = Fixture::new();
    let alice = member(10, "alice");
    let room = fx.join_lobby(&alice).await;

    fx.disconnect(&alice).await;

    // Still there during the settle window.
    time::sleep(Duration::from_millis(1_500)).await;
    assert!(fx.guild.channel(room).is_some());
    assert_eq!(fx.guild.calls(ProvisionOp::Delete), 0);

    time::sleep(Duration::from_secs(1)).await;
    assert!(fx.guild.channel(room).is_none());
    assert!(!fx.registry().is_managed(room));
    assert_eq!(fx.guild.calls(ProvisionOp::Delete), 1);
}

#[tokio::test(start_paused = true)]
async fn test_leave_and_rejoin_within_settle_delay_never_deletes() {
    let fx = Fixture::new();
    let alice = member(10, "alice");
    let room = fx.join_lobby(&alice).await;

    fx.disconnect(&alice).await;
    time::sleep(Duration::from_secs(1)).await;
    fx.connect(&alice, room).await;

    time::sleep(PAST_SETTLE).await;
    assert_eq!(fx.guild.calls(ProvisionOp::Delete), 0);
    assert!(fx.registry().is_managed(room));
    assert!(fx.guild.channel(room).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_room_with_remaining_member_is_kept() {
    let fx = Fixture::new();
    let alice = member(10, "alice");
    let bob = member(11, "bob");
    let room = fx.join_lobby(&alice).await;
    fx.connect(&bob, room).await;

    fx.disconnect(&alice).await;
    time::sleep(PAST_SETTLE).await;

    assert!(fx.registry().is_managed(room));
    assert_eq!(fx.guild.calls(ProvisionOp::Delete), 0);
    assert_eq!(fx.guild.calls(ProvisionOp::MemberCount), 1);
}

#[tokio::test(start_paused = true)]
async fn test_two_members_leaving_together_cause_one_deletion() {
    let fx = Fixture::new();
    let alice = member(10, "alice");
    let bob = member(11, "bob");
    let room = fx.join_lobby(&alice).await;
    fx.connect(&bob, room).await;

    let alice_left = fx.guild.disconnect(&alice);
    let bob_left = fx.guild.disconnect(&bob);
    tokio::join!(
        fx.manager.on_voice_state_update(alice_left),
        fx.manager.on_voice_state_update(bob_left),
    );

    time::sleep(PAST_SETTLE).await;
    assert_eq!(fx.guild.calls(ProvisionOp::Delete), 1);
    assert!(!fx.registry().is_managed(room));
    assert_eq!(fx.registry().pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_moving_between_rooms_deletes_only_the_abandoned_one() {
    let fx = Fixture::new();
    let alice = member(10, "alice");
    let bob = member(11, "bob");
    let alice_room = fx.join_lobby(&alice).await;
    let bob_room = fx.join_lobby(&bob).await;

    fx.connect(&alice, bob_room).await;
    time::sleep(PAST_SETTLE).await;

    assert!(!fx.registry().is_managed(alice_room));
    assert!(fx.registry().is_managed(bob_room));
    assert_eq!(fx.guild.occupancy(bob_room), 2);
}

#[tokio::test(start_paused = true)]
async fn test_mute_toggle_does_not_arm_settle_check() {
    let fx = Fixture::new();
    let alice = member(10, "alice");
    let room = fx.join_lobby(&alice).await;

    fx.manager
        .on_voice_state_update(VoiceStateUpdate {
            member: alice.clone().in_channel(room),
            before: Some(room),
            after: Some(room),
        })
        .await;

    assert!(!fx.manager.settle().is_scheduled(room));
    time::sleep(PAST_SETTLE).await;
    assert_eq!(fx.guild.calls(ProvisionOp::MemberCount), 0);
}

#[tokio::test(start_paused = true)]
async fn test_leaving_unmanaged_channel_is_ignored() {
    let fx = Fixture::new();
    fx.guild.add_voice_channel(ChannelId(300), "general");
    let alice = member(10, "alice");
    fx.connect(&alice, ChannelId(300)).await;

    fx.disconnect(&alice).await;
    time::sleep(PAST_SETTLE).await;

    assert_eq!(fx.guild.calls(ProvisionOp::MemberCount), 0);
    assert!(fx.guild.channel(ChannelId(300)).is_some());
}

// =========================================================================
// delete_if_empty outcomes
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_delete_not_found_unregisters_without_error() {
    let fx = Fixture::new();
    let alice = member(10, "alice");
    let room = fx.join_lobby(&alice).await;
    fx.guild.disconnect(&alice);
    fx.guild
        .fail_next(ProvisionOp::Delete, ProvisionError::NotFound(room));

    let outcome = fx.manager.delete_if_empty(room).await;

    assert_eq!(outcome, DeletionOutcome::AlreadyGone);
    assert!(!fx.registry().is_managed(room));
}

#[tokio::test(start_paused = true)]
async fn test_room_deleted_elsewhere_is_reconciled() {
    let fx = Fixture::new();
    let room = fx.join_lobby(&member(10, "alice")).await;
    fx.guild.remove_channel(room);

    let outcome = fx.manager.delete_if_empty(room).await;

    assert_eq!(outcome, DeletionOutcome::AlreadyGone);
    assert!(!fx.registry().is_managed(room));
    assert_eq!(fx.guild.calls(ProvisionOp::Delete), 0);
}

#[tokio::test(start_paused = true)]
async fn test_delete_permission_denied_retains_then_retries() {
    let fx = Fixture::new();
    let alice = member(10, "alice");
    let room = fx.join_lobby(&alice).await;
    fx.guild
        .fail_next(ProvisionOp::Delete, ProvisionError::PermissionDenied("manage channels".into()));

    fx.disconnect(&alice).await;
    time::sleep(PAST_SETTLE).await;

    assert!(fx.registry().is_managed(room));
    assert!(!fx.registry().is_pending_deletion(room));
    assert!(fx.guild.channel(room).is_some());

    // Next qualifying event: alice drops in and out again.
    fx.connect(&alice, room).await;
    fx.disconnect(&alice).await;
    time::sleep(PAST_SETTLE).await;

    assert!(!fx.registry().is_managed(room));
    assert_eq!(fx.guild.calls(ProvisionOp::Delete), 2);
}

#[tokio::test(start_paused = true)]
async fn test_delete_unexpected_failure_retains_room() {
    let fx = Fixture::new();
    let alice = member(10, "alice");
    let room = fx.join_lobby(&alice).await;
    fx.guild.disconnect(&alice);
    fx.guild
        .fail_next(ProvisionOp::Delete, ProvisionError::Unexpected("503".into()));

    assert_eq!(fx.manager.delete_if_empty(room).await, DeletionOutcome::Retained);
    assert!(fx.registry().is_managed(room));
    assert_eq!(fx.registry().pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_deletions_issue_one_delete() {
    let fx = Fixture::new();
    let alice = member(10, "alice");
    let room = fx.join_lobby(&alice).await;
    fx.guild.disconnect(&alice);

    let (first, second) = tokio::join!(
        fx.manager.delete_if_empty(room),
        fx.manager.delete_if_empty(room),
    );

    assert_eq!(first, DeletionOutcome::Deleted);
    assert_eq!(second, DeletionOutcome::AlreadyPending);
    assert_eq!(fx.guild.calls(ProvisionOp::Delete), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_platform_turns_away_second_trigger() {
    // Every platform call takes 300ms, so the settle check spans well past
    // the settle delay.
    let fx = Fixture::with_guild(
        MemoryProvisioner::new(BOT).with_latency(Duration::from_millis(300)),
        LobbyConfig::default().with_lobby("Игры", LOBBY, CATEGORY, "Игровая {user}"),
    );
    let alice = member(10, "alice");
    let bob = member(11, "bob");
    let room = fx.join_lobby(&alice).await;
    fx.connect(&bob, room).await;

    fx.disconnect(&alice).await;
    fx.disconnect(&bob).await;
    // The check has fired and is waiting on the platform; a second trigger
    // for the same room is turned away.
    time::sleep(Duration::from_millis(2_100)).await;
    assert!(fx.registry().is_pending_deletion(room));
    assert_eq!(
        fx.manager.delete_if_empty(room).await,
        DeletionOutcome::AlreadyPending
    );

    time::sleep(PAST_SETTLE).await;
    assert!(!fx.registry().is_managed(room));
    assert_eq!(fx.guild.calls(ProvisionOp::Delete), 1);
}

#[tokio::test(start_paused = true)]
async fn test_delete_unmanaged_channel_is_noop() {
    let fx = Fixture::new();
    assert_eq!(
        fx.manager.delete_if_empty(LOBBY).await,
        DeletionOutcome::NotManaged
    );
    assert!(fx.guild.channel(LOBBY).is_some());
}

// =========================================================================
// Guild departure and bans
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_member_remove_deletes_empty_room_immediately() {
    let fx = Fixture::new();
    let alice = member(10, "alice");
    let room = fx.join_lobby(&alice).await;

    // The platform tears down the voice connection; the departure event
    // still carries the channel the member was in.
    fx.guild.disconnect(&alice);
    fx.manager
        .handle_event(GatewayEvent::MemberRemove {
            member: alice.clone().in_channel(room),
        })
        .await;

    assert!(!fx.registry().is_managed(room));
    assert_eq!(fx.guild.calls(ProvisionOp::Delete), 1);
}

#[tokio::test(start_paused = true)]
async fn test_member_remove_keeps_occupied_room() {
    let fx = Fixture::new();
    let alice = member(10, "alice");
    let bob = member(11, "bob");
    let room = fx.join_lobby(&alice).await;
    fx.connect(&bob, room).await;

    fx.guild.disconnect(&alice);
    fx.manager.on_member_remove(alice.clone().in_channel(room)).await;

    assert!(fx.registry().is_managed(room));
    assert_eq!(fx.guild.calls(ProvisionOp::Delete), 0);
}

#[tokio::test(start_paused = true)]
async fn test_member_remove_and_settle_share_one_guard() {
    let fx = Fixture::new();
    let alice = member(10, "alice");
    let room = fx.join_lobby(&alice).await;
    fx.guild.disconnect(&alice);

    tokio::join!(
        fx.manager.delete_if_empty(room),
        fx.manager.on_member_remove(alice.clone().in_channel(room)),
    );

    assert_eq!(fx.guild.calls(ProvisionOp::Delete), 1);
    assert!(!fx.registry().is_managed(room));
}

#[tokio::test(start_paused = true)]
async fn test_member_ban_of_connected_member_keeps_occupied_room() {
    let fx = Fixture::new();
    let alice = member(10, "alice");
    let room = fx.join_lobby(&alice).await;

    fx.manager
        .handle_event(GatewayEvent::MemberBan {
            guild_id: GUILD,
            user_id: alice.id,
        })
        .await;

    assert_eq!(fx.guild.calls(ProvisionOp::MemberChannel), 1);
    assert!(fx.registry().is_managed(room));

    // Once the platform drops the connection, the normal path cleans up.
    fx.disconnect(&alice).await;
    time::sleep(PAST_SETTLE).await;
    assert!(!fx.registry().is_managed(room));
}

#[tokio::test(start_paused = true)]
async fn test_member_ban_lookup_failure_falls_back_to_last_room() {
    let fx = Fixture::new();
    let alice = member(10, "alice");
    let room = fx.join_lobby(&alice).await;
    fx.guild.disconnect(&alice);
    fx.guild
        .fail_next(ProvisionOp::MemberChannel, ProvisionError::Unexpected("timeout".into()));

    fx.manager.on_member_ban(GUILD, alice.id).await;

    assert!(!fx.registry().is_managed(room));
    assert_eq!(fx.guild.calls(ProvisionOp::Delete), 1);
}

#[tokio::test(start_paused = true)]
async fn test_member_ban_after_teardown_deletes_room_immediately() {
    let fx = Fixture::new();
    let alice = member(10, "alice");
    let room = fx.join_lobby(&alice).await;

    // The platform drops the connection and no voice update reaches us.
    fx.guild.disconnect(&alice);
    fx.manager
        .handle_event(GatewayEvent::MemberBan {
            guild_id: GUILD,
            user_id: alice.id,
        })
        .await;

    assert!(!fx.registry().is_managed(room));
    assert!(fx.guild.channel(room).is_none());
    assert_eq!(fx.guild.calls(ProvisionOp::Delete), 1);
    assert_eq!(fx.manager.last_room(alice.id), None);
}

#[tokio::test(start_paused = true)]
async fn test_member_ban_after_leave_event_does_not_wait_for_settle() {
    let fx = Fixture::new();
    let alice = member(10, "alice");
    let room = fx.join_lobby(&alice).await;
    fx.disconnect(&alice).await;
    assert!(fx.manager.settle().is_scheduled(room));

    fx.manager.on_member_ban(GUILD, alice.id).await;

    assert!(!fx.registry().is_managed(room));
    assert!(!fx.manager.settle().is_scheduled(room));
    time::sleep(PAST_SETTLE).await;
    assert_eq!(fx.guild.calls(ProvisionOp::Delete), 1);
    assert_eq!(fx.guild.calls(ProvisionOp::MemberCount), 1);
}

#[tokio::test(start_paused = true)]
async fn test_member_ban_and_settle_check_share_one_guard() {
    let fx = Fixture::new();
    let alice = member(10, "alice");
    let room = fx.join_lobby(&alice).await;
    fx.guild.disconnect(&alice);

    let (settled, ()) = tokio::join!(
        fx.manager.delete_if_empty(room),
        fx.manager.on_member_ban(GUILD, alice.id),
    );

    assert_eq!(settled, DeletionOutcome::Deleted);
    assert_eq!(fx.guild.calls(ProvisionOp::Delete), 1);
    assert_eq!(fx.registry().pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_member_ban_of_room_guest_keeps_owner_room() {
    let fx = Fixture::new();
    let alice = member(10, "alice");
    let bob = member(11, "bob");
    let room = fx.join_lobby(&alice).await;
    fx.connect(&bob, room).await;
    assert_eq!(fx.manager.last_room(bob.id), Some(room));

    fx.guild.disconnect(&bob);
    fx.manager.on_member_ban(GUILD, bob.id).await;

    assert!(fx.registry().is_managed(room));
    assert_eq!(fx.guild.calls(ProvisionOp::Delete), 0);
}

#[tokio::test(start_paused = true)]
async fn test_member_remove_without_voice_snapshot_uses_last_room() {
    let fx = Fixture::new();
    let alice = member(10, "alice");
    let room = fx.join_lobby(&alice).await;
    let departed = fx.guild.disconnect(&alice).member;

    fx.manager.on_member_remove(departed).await;

    assert!(!fx.registry().is_managed(room));
    assert_eq!(fx.guild.calls(ProvisionOp::Delete), 1);
}

#[tokio::test(start_paused = true)]
async fn test_last_room_follows_member_out_of_managed_rooms() {
    let fx = Fixture::new();
    fx.guild.add_voice_channel(ChannelId(300), "general");
    let alice = member(10, "alice");
    let room = fx.join_lobby(&alice).await;
    assert_eq!(fx.manager.last_room(alice.id), Some(room));

    fx.connect(&alice, ChannelId(300)).await;

    assert_eq!(fx.manager.last_room(alice.id), None);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_disarms_settle_checks() {
    let fx = Fixture::new();
    let alice = member(10, "alice");
    let room = fx.join_lobby(&alice).await;
    fx.disconnect(&alice).await;

    fx.manager.shutdown();
    time::sleep(PAST_SETTLE).await;

    assert!(fx.registry().is_managed(room));
    assert_eq!(fx.guild.calls(ProvisionOp::Delete), 0);
}
