//! Deferred per-channel emptiness checks.
//!
//! Leaving a voice channel is often momentary: a member hopping between
//! two rooms produces a leave immediately followed by a join. Instead of
//! sleeping inside the event handler, the lifecycle manager hands the
//! emptiness check to a [`SettleScheduler`], which runs it once the
//! channel has been quiet for the settle delay.
//!
//! # Semantics
//!
//! - At most one check is armed per channel. Scheduling again re-arms the
//!   timer, so overlapping leaves coalesce into a single check.
//! - [`SettleScheduler::cancel`] disarms a channel's timer (someone joined).
//! - Once a timer fires, its check is detached from the scheduler: it can
//!   no longer be cancelled or replaced, only raced by a newer timer.
//!
//! # Timers and generations
//!
//! Each armed timer is a spawned Tokio task holding an [`AbortHandle`] in
//! the scheduler's map, tagged with a generation number drawn from a
//! shared counter. When the sleep finishes, the task removes its map entry
//! only if the entry still carries its own generation. A timer that lost
//! that race was re-armed or cancelled in the meantime, so it exits
//! without running its check.
//!
//! Removing the entry before running the check is what detaches it.
//! From then on `cancel` finds nothing to abort, and a fresh `schedule`
//! for the same channel arms an independent timer. Two checks for one
//! channel can therefore overlap; the lifecycle manager's pending-deletion
//! guard makes the second one a no-op.
//!
//! ```text
//!  schedule(c) ──→ armed(gen 1) ──schedule(c)──→ armed(gen 2)   (gen 1 aborted)
//!  armed(gen n) ──cancel(c)──→ idle
//!  armed(gen n) ──delay elapses, entry still gen n──→ check runs (detached)
//! ```
//!
//! All timing goes through `tokio::time`, so tests drive the scheduler
//! with a paused clock instead of real sleeps.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tempvoice_protocol::ChannelId;
use tokio::task::AbortHandle;
use tokio::time;

#[derive(Debug)]
struct Timer {
    generation: u64,
    handle: AbortHandle,
}

#[derive(Debug)]
struct Inner {
    delay: Duration,
    timers: DashMap<ChannelId, Timer>,
    next_generation: AtomicU64,
}

impl Inner {
    /// Removes the timer for `channel` if it is still the one identified by
    /// `generation`. Returns `true` if the caller now owns the check.
    fn take(&self, channel: ChannelId, generation: u64) -> bool {
        self.timers
            .remove_if(&channel, |_, timer| timer.generation == generation)
            .is_some()
    }
}

/// Schedules deferred checks keyed by channel id.
///
/// Cheap to clone; clones share the same timers. Must be used from within
/// a Tokio runtime.
#[derive(Debug, Clone)]
pub struct SettleScheduler {
    inner: Arc<Inner>,
}

impl SettleScheduler {
    /// Creates a scheduler that waits `delay` before running a check.
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                delay,
                timers: DashMap::new(),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// Arms (or re-arms) the timer for `channel`. When it fires, `check`
    /// is called and its future driven to completion.
    pub fn schedule<F, Fut>(&self, channel: ChannelId, check: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);

        // Spawn while holding the entry so a zero delay cannot fire before
        // the timer is recorded.
        match self.inner.timers.entry(channel) {
            Entry::Occupied(mut entry) => {
                let handle = spawn_timer(inner, channel, generation, check);
                let previous = entry.insert(Timer { generation, handle });
                previous.handle.abort();
                tracing::trace!(%channel, "settle check re-armed");
            }
            Entry::Vacant(entry) => {
                let handle = spawn_timer(inner, channel, generation, check);
                entry.insert(Timer { generation, handle });
                tracing::trace!(%channel, "settle check armed");
            }
        }
    }

    /// Disarms the timer for `channel`. Returns `true` if one was armed.
    pub fn cancel(&self, channel: ChannelId) -> bool {
        match self.inner.timers.remove(&channel) {
            Some((_, timer)) => {
                timer.handle.abort();
                tracing::trace!(%channel, "settle check cancelled");
                true
            }
            None => false,
        }
    }

    /// Disarms every timer.
    pub fn cancel_all(&self) {
        self.inner.timers.retain(|_, timer| {
            timer.handle.abort();
            false
        });
    }

    pub fn is_scheduled(&self, channel: ChannelId) -> bool {
        self.inner.timers.contains_key(&channel)
    }

    /// Number of armed timers.
    pub fn scheduled_count(&self) -> usize {
        self.inner.timers.len()
    }
}

fn spawn_timer<F, Fut>(
    inner: Arc<Inner>,
    channel: ChannelId,
    generation: u64,
    check: F,
) -> AbortHandle
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        time::sleep(inner.delay).await;
        if inner.take(channel, generation) {
            drop(inner);
            check().await;
        }
    })
    .abort_handle()
}
