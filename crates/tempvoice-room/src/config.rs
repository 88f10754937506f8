//! Lobby configuration and lifecycle timing.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tempvoice_protocol::ChannelId;

use crate::RoomError;

/// Name template used when a lobby tag has no template of its own.
pub const DEFAULT_NAME_TEMPLATE: &str = "Room {user}";

/// Placeholder in a name template that is replaced by the member's display name.
const USER_PLACEHOLDER: &str = "{user}";

// ---------------------------------------------------------------------------
// LobbyConfig
// ---------------------------------------------------------------------------

/// Maps lobby tags to their source channel, destination category, and
/// room name template.
///
/// Loaded once at startup and immutable afterwards. A tag missing from
/// `category_ids` is a configuration problem reported at runtime, not a
/// load failure.
///
/// ```toml
/// [lobby_channels]
/// games = 1100
///
/// [category_ids]
/// games = 2200
///
/// [name_templates]
/// games = "Игровая {user}"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyConfig {
    /// Lobby tag → lobby voice channel that triggers room creation.
    #[serde(default)]
    pub lobby_channels: BTreeMap<String, ChannelId>,

    /// Lobby tag → category that new rooms are created under.
    #[serde(default)]
    pub category_ids: BTreeMap<String, ChannelId>,

    /// Lobby tag → room name template containing `{user}`.
    #[serde(default)]
    pub name_templates: BTreeMap<String, String>,
}

/// Everything needed to create a room for one lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLobby {
    pub tag: String,
    pub category: ChannelId,
    pub name_template: String,
}

impl ResolvedLobby {
    /// Formats the room name for a member.
    pub fn room_name(&self, display_name: &str) -> String {
        self.name_template.replace(USER_PLACEHOLDER, display_name)
    }
}

impl LobbyConfig {
    /// Adds a fully specified lobby. Convenience for programmatic setup.
    pub fn with_lobby(
        mut self,
        tag: impl Into<String>,
        lobby: ChannelId,
        category: ChannelId,
        name_template: impl Into<String>,
    ) -> Self {
        let tag = tag.into();
        self.lobby_channels.insert(tag.clone(), lobby);
        self.category_ids.insert(tag.clone(), category);
        self.name_templates.insert(tag, name_template.into());
        self
    }

    /// Returns the tag of the lobby whose source channel is `channel`.
    ///
    /// `None` is the common case: most voice channels are not lobbies.
    pub fn lobby_tag(&self, channel: ChannelId) -> Option<&str> {
        self.lobby_channels
            .iter()
            .find(|(_, id)| **id == channel)
            .map(|(tag, _)| tag.as_str())
    }

    /// Returns `true` if `channel` is one of the configured lobbies.
    pub fn is_lobby(&self, channel: ChannelId) -> bool {
        self.lobby_tag(channel).is_some()
    }

    /// Resolves a lobby tag to its category and name template.
    ///
    /// # Errors
    /// [`RoomError::Configuration`] if the tag has no category.
    pub fn resolve(&self, tag: &str) -> Result<ResolvedLobby, RoomError> {
        let category = self.category_ids.get(tag).copied().ok_or_else(|| {
            RoomError::Configuration(format!("lobby '{tag}' has no category configured"))
        })?;
        let name_template = self
            .name_templates
            .get(tag)
            .cloned()
            .unwrap_or_else(|| DEFAULT_NAME_TEMPLATE.to_string());
        Ok(ResolvedLobby {
            tag: tag.to_string(),
            category,
            name_template,
        })
    }

    /// Reports configuration problems without rejecting the config.
    ///
    /// - a lobby tag without a category
    /// - a source channel claimed by more than one tag
    /// - a template without the `{user}` placeholder
    pub fn validate(&self) -> Vec<RoomError> {
        let mut problems = Vec::new();
        let mut seen: BTreeMap<ChannelId, &str> = BTreeMap::new();

        for (tag, channel) in &self.lobby_channels {
            if !self.category_ids.contains_key(tag) {
                problems.push(RoomError::Configuration(format!(
                    "lobby '{tag}' has no category configured"
                )));
            }
            if let Some(first) = seen.insert(*channel, tag) {
                problems.push(RoomError::Configuration(format!(
                    "channel {channel} is the lobby for both '{first}' and '{tag}'"
                )));
            }
        }
        for (tag, template) in &self.name_templates {
            if !template.contains(USER_PLACEHOLDER) {
                problems.push(RoomError::Configuration(format!(
                    "name template for '{tag}' has no {USER_PLACEHOLDER} placeholder"
                )));
            }
        }
        problems
    }
}

// ---------------------------------------------------------------------------
// LifecycleConfig
// ---------------------------------------------------------------------------

/// Timing for the room lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// How long to wait after someone leaves a room before checking whether
    /// it is empty. Absorbs quick leave/rejoin and channel-to-channel moves.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_settle_delay_ms() -> u64 {
    2_000
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl LifecycleConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}
