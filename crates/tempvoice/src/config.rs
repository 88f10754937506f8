//! Bot configuration loaded from TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tempvoice_room::{LifecycleConfig, LobbyConfig};
use thiserror::Error;

/// Errors loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Everything the bot reads at startup.
///
/// ```toml
/// [lifecycle]
/// settle_delay_ms = 2000
///
/// [lobbies.lobby_channels]
/// games = 1100
///
/// [lobbies.category_ids]
/// games = 2200
///
/// [lobbies.name_templates]
/// games = "Игровая {user}"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotConfig {
    /// Lobby channels and where their rooms go.
    #[serde(default)]
    pub lobbies: LobbyConfig,
    /// Room lifecycle timing.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

impl BotConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BotConfig = toml::from_str(content)?;
        Ok(config)
    }
}
