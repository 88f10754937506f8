//! Temporary voice room management for tempvoice.
//!
//! A member joining a configured lobby channel gets a fresh voice channel
//! of their own; once that channel empties out it is deleted again.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: which channels the bot created and is still tracking
//! - [`LifecycleManager`]: reacts to gateway events, creates/deletes rooms
//! - [`Provisioner`]: the platform capability that actually mutates channels
//! - [`LobbyConfig`] / [`LifecycleConfig`]: lobby mapping and timing
//! - [`SettleScheduler`]: per-channel deferred emptiness checks
//! - [`MemoryProvisioner`]: in-process provisioner for simulations and tests

mod config;
mod error;
mod lifecycle;
mod memory;
mod provisioner;
mod registry;
mod settle;

pub use config::{DEFAULT_NAME_TEMPLATE, LifecycleConfig, LobbyConfig, ResolvedLobby};
pub use error::{ProvisionError, RoomError};
pub use lifecycle::{DeletionOutcome, LifecycleManager};
pub use memory::{MemoryChannel, MemoryProvisioner, OverwriteKey, ProvisionOp};
pub use provisioner::{Provisioner, VoiceChannelSpec};
pub use registry::{DeletionGuard, ManagedRoom, RoomRegistry};
pub use settle::SettleScheduler;
