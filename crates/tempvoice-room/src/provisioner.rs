//! The platform capability that performs channel mutations.
//!
//! tempvoice never talks to the chat platform directly. Everything that
//! changes a channel goes through the [`Provisioner`] trait, implemented by
//! whatever gateway client the bot is embedded in. [`MemoryProvisioner`]
//! is the in-process implementation used by the demo and the tests.
//!
//! # Async methods in the trait
//!
//! The methods are declared as `fn ... -> impl Future<Output = ...> + Send`
//! and implemented with plain `async fn`. Spelling out the `Send` bound in
//! the declaration lets generic callers spawn the futures on the
//! multi-threaded runtime, which the settle timers do. The trait is not
//! object safe as a result; callers are generic over `P: Provisioner` and
//! share a single instance through `Arc<P>`.
//!
//! # Errors
//!
//! Every method reports failures as [`ProvisionError`]. Callers treat
//! [`ProvisionError::NotFound`] on delete as success (the channel is
//! already gone) and [`ProvisionError::PermissionDenied`] as a
//! configuration problem worth a warning. Anything else is logged as an
//! error and left for a later event to retry.
//!
//! [`MemoryProvisioner`]: crate::MemoryProvisioner

use std::future::Future;

use tempvoice_protocol::{AccessRules, ChannelId, OverwriteTarget, PermissionOverwrite, UserId};

use crate::ProvisionError;

/// Parameters for creating a new voice channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceChannelSpec {
    /// Category the channel is created under.
    pub category: ChannelId,
    pub name: String,
    /// Participant cap. 0 means unlimited.
    pub user_limit: u32,
    /// Initial permission overwrites.
    pub access: AccessRules,
}

/// Creates, deletes, and edits channels on the chat platform.
///
/// Every method is a suspension point: implementations perform network
/// calls, and callers must assume other event handlers run in between.
///
/// # Trait bounds
///
/// `Send + Sync + 'static` because one provisioner is shared (behind an
/// `Arc`) by the lifecycle manager, its deferred settle checks, and the
/// command handlers. The returned futures are `Send` so they can be
/// driven from spawned tasks.
pub trait Provisioner: Send + Sync + 'static {
    /// The bot's own user id. Newly created rooms grant it management rights.
    fn bot_user_id(&self) -> UserId;

    /// Returns `true` if `category` exists on the server.
    fn category_exists(
        &self,
        category: ChannelId,
    ) -> impl Future<Output = Result<bool, ProvisionError>> + Send;

    /// Creates a voice channel and returns its id.
    fn create_voice_channel(
        &self,
        spec: VoiceChannelSpec,
    ) -> impl Future<Output = Result<ChannelId, ProvisionError>> + Send;

    /// Deletes a channel.
    ///
    /// Returns [`ProvisionError::NotFound`] if it is already gone.
    fn delete_channel(
        &self,
        channel: ChannelId,
    ) -> impl Future<Output = Result<(), ProvisionError>> + Send;

    /// Moves a connected member into `channel`.
    fn move_member(
        &self,
        user: UserId,
        channel: ChannelId,
    ) -> impl Future<Output = Result<(), ProvisionError>> + Send;

    /// Number of members currently connected to `channel`.
    ///
    /// Returns [`ProvisionError::NotFound`] if the channel no longer exists.
    fn member_count(
        &self,
        channel: ChannelId,
    ) -> impl Future<Output = Result<usize, ProvisionError>> + Send;

    /// The voice channel `user` is connected to, if any.
    fn member_channel(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Option<ChannelId>, ProvisionError>> + Send;

    /// Renames a channel.
    fn rename_channel(
        &self,
        channel: ChannelId,
        name: String,
    ) -> impl Future<Output = Result<(), ProvisionError>> + Send;

    /// Sets the participant cap. 0 means unlimited.
    fn set_user_limit(
        &self,
        channel: ChannelId,
        limit: u32,
    ) -> impl Future<Output = Result<(), ProvisionError>> + Send;

    /// Replaces the overwrite for `target`, or clears it when `overwrite`
    /// is `None` (the target falls back to inherited permissions). An
    /// overwrite with every field unset is treated the same as `None`.
    fn set_permission_overwrite(
        &self,
        channel: ChannelId,
        target: OverwriteTarget,
        overwrite: Option<PermissionOverwrite>,
    ) -> impl Future<Output = Result<(), ProvisionError>> + Send;
}
