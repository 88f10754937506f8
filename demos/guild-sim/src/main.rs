//! Drives a tempvoice bot against a simulated guild.
//!
//! Reads one JSON action per line from stdin and prints command replies and
//! room listings as JSON lines on stdout. Logs go to stderr.
//!
//! ```text
//! {"op":"join","user":10,"name":"alice","channel":1100}
//! {"op":"command","user":10,"command":"setlimit","options":[{"name":"limit","value":4}]}
//! {"op":"leave","user":10}
//! {"op":"wait","ms":2500}
//! {"op":"rooms"}
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tempvoice::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const BOT: UserId = UserId(1);
const GUILD: GuildId = GuildId(1);

// ---------------------------------------------------------------------------
// Simulation input
// ---------------------------------------------------------------------------

/// One line of simulation input.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Action {
    /// Connect (or move) a member to a voice channel.
    Join {
        user: u64,
        #[serde(default)]
        name: Option<String>,
        channel: u64,
    },
    /// Disconnect a member from voice.
    Leave { user: u64 },
    /// The member leaves the guild while connected.
    Depart { user: u64 },
    /// The member is banned.
    Ban { user: u64 },
    /// The member invokes a slash command.
    Command {
        user: u64,
        command: String,
        #[serde(default)]
        options: Vec<CommandOption>,
    },
    /// Let time pass so settle checks can fire.
    Wait { ms: u64 },
    /// Print the managed rooms.
    Rooms,
}

/// A managed room as printed by `rooms`.
#[derive(Debug, Serialize)]
struct RoomView {
    id: ChannelId,
    name: String,
    user_limit: u32,
    members: usize,
    private: bool,
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

struct Simulation {
    bot: TempVoice<MemoryProvisioner>,
    bus: EventBus,
    roster: HashMap<UserId, Member>,
    codec: JsonCodec,
}

impl Simulation {
    fn new(config: BotConfig) -> Self {
        let guild = MemoryProvisioner::new(BOT);
        for (tag, lobby) in &config.lobbies.lobby_channels {
            guild.add_voice_channel(*lobby, tag.clone());
        }
        for category in config.lobbies.category_ids.values() {
            guild.add_category(*category);
        }

        let bot = TempVoiceBuilder::new().config(config).build(guild);
        let mut bus = EventBus::new();
        bot.install(&mut bus);
        Self {
            bot,
            bus,
            roster: HashMap::new(),
            codec: JsonCodec,
        }
    }

    fn guild(&self) -> &Arc<MemoryProvisioner> {
        self.bot.provisioner()
    }

    /// The member as the gateway would currently describe them.
    fn snapshot(&self, user: UserId) -> Member {
        let member = self
            .roster
            .get(&user)
            .cloned()
            .unwrap_or_else(|| Member::new(user, GUILD, format!("user{}", user.0)));
        match self.guild().location(user) {
            Some(channel) => member.in_channel(channel),
            None => member,
        }
    }

    async fn publish(&self, event: GatewayEvent) {
        for handle in self.bus.publish(event) {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "event handler panicked");
            }
        }
    }

    /// Applies one action. Returns a line to print, if any.
    async fn apply(&mut self, action: Action) -> Result<Option<Vec<u8>>, TempVoiceError> {
        match action {
            Action::Join { user, name, channel } => {
                let user = UserId(user);
                if let Some(name) = name {
                    self.roster.insert(user, Member::new(user, GUILD, name));
                }
                let update = self.guild().connect(&self.snapshot(user), ChannelId(channel));
                self.publish(GatewayEvent::VoiceStateUpdate(update)).await;
                Ok(None)
            }
            Action::Leave { user } => {
                let update = self.guild().disconnect(&self.snapshot(UserId(user)));
                self.publish(GatewayEvent::VoiceStateUpdate(update)).await;
                Ok(None)
            }
            Action::Depart { user } => {
                let member = self.snapshot(UserId(user));
                self.guild().disconnect(&member);
                self.roster.remove(&member.id);
                self.publish(GatewayEvent::MemberRemove { member }).await;
                Ok(None)
            }
            Action::Ban { user } => {
                self.publish(GatewayEvent::MemberBan {
                    guild_id: GUILD,
                    user_id: UserId(user),
                })
                .await;
                Ok(None)
            }
            Action::Command {
                user,
                command,
                options,
            } => {
                let invocation = CommandInvocation {
                    name: command,
                    caller: self.snapshot(UserId(user)),
                    options,
                };
                let reply = self.bus.invoke(invocation).await;
                Ok(Some(self.codec.encode(&reply)?))
            }
            Action::Wait { ms } => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(None)
            }
            Action::Rooms => Ok(Some(self.codec.encode(&self.rooms())?)),
        }
    }

    fn rooms(&self) -> Vec<RoomView> {
        let mut ids = self.bot.registry().channel_ids();
        ids.sort_unstable();
        ids.into_iter()
            .filter_map(|id| self.guild().channel(id))
            .map(|channel| RoomView {
                id: channel.id,
                members: self.guild().occupancy(channel.id),
                private: channel
                    .overwrite(OverwriteTarget::DefaultRole)
                    .is_some_and(|o| o.connect == Some(false)),
                name: channel.name,
                user_limit: channel.user_limit,
            })
            .collect()
    }

    /// Lets pending settle checks fire before exiting.
    async fn settle(&self) {
        let scheduler = self.bot.lifecycle().settle();
        if scheduler.scheduled_count() > 0 {
            tracing::info!(pending = scheduler.scheduled_count(), "waiting for settle checks");
            tokio::time::sleep(scheduler.delay() + Duration::from_millis(100)).await;
        }
    }
}

/// Two lobbies, used when no config file is given.
fn builtin_config() -> BotConfig {
    BotConfig {
        lobbies: LobbyConfig::default()
            .with_lobby("Игры", ChannelId(1100), ChannelId(2200), "Игровая {user}")
            .with_lobby("Кинозал", ChannelId(1200), ChannelId(2300), "Кино у {user}"),
        lifecycle: LifecycleConfig::default(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => BotConfig::load(&path).map_err(|e| {
            tracing::error!(%path, error = %e, "failed to load config");
            e
        })?,
        None => builtin_config(),
    };

    let mut sim = Simulation::new(config);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let action: Action = match serde_json::from_str(line) {
            Ok(action) => action,
            Err(e) => {
                tracing::warn!(error = %e, line, "skipping malformed action");
                continue;
            }
        };
        if let Some(output) = sim.apply(action).await? {
            println!("{}", String::from_utf8_lossy(&output));
        }
    }

    sim.settle().await;
    println!("{}", String::from_utf8_lossy(&sim.codec.encode(&sim.rooms())?));
    sim.bot.shutdown();
    Ok(())
}
