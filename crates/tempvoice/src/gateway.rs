//! Gateway subscription interface and an in-process event bus.
//!
//! A [`Gateway`] is whatever delivers platform events and slash-command
//! invocations to the bot. Components subscribe plain handlers to it; the
//! gateway decides how events are scheduled. [`EventBus`] runs every
//! handler of an event as its own Tokio task, so a slow provisioner call
//! for one room never blocks events for another.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tempvoice_protocol::{CommandInvocation, CommandReply, EventKind, GatewayEvent};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

/// Handles one gateway event.
pub type EventHandler = Arc<dyn Fn(GatewayEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// Handles one command invocation and produces the reply for the caller.
pub type CommandHandler =
    Arc<dyn Fn(CommandInvocation) -> BoxFuture<'static, CommandReply> + Send + Sync>;

/// Something that delivers events and command invocations.
pub trait Gateway {
    /// Calls `handler` for every event of `kind`.
    fn subscribe(&mut self, kind: EventKind, handler: EventHandler);

    /// Routes invocations of the command `name` to `handler`.
    ///
    /// Registering the same name twice replaces the earlier handler.
    fn register_command(&mut self, name: &str, handler: CommandHandler);
}

/// In-process [`Gateway`]: events are published by the host, which is
/// also responsible for turning platform payloads into [`GatewayEvent`]s.
#[derive(Default)]
pub struct EventBus {
    handlers: HashMap<EventKind, Vec<EventHandler>>,
    commands: HashMap<String, CommandHandler>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handlers subscribed to `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Registered command names, sorted.
    pub fn command_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Spawns one task per handler subscribed to the event's kind.
    ///
    /// Returns immediately; await the handles to wait for the handlers.
    /// Must be called from within a Tokio runtime.
    pub fn publish(&self, event: GatewayEvent) -> Vec<JoinHandle<()>> {
        let kind = event.kind();
        let Some(handlers) = self.handlers.get(&kind) else {
            tracing::trace!(%kind, "no subscribers for event");
            return Vec::new();
        };
        handlers
            .iter()
            .map(|handler| tokio::spawn(handler(event.clone())))
            .collect()
    }

    /// Runs the handler for an invocation and returns its reply.
    ///
    /// A malformed invocation or an unregistered command gets a failure
    /// reply without reaching any handler.
    pub async fn invoke(&self, invocation: CommandInvocation) -> CommandReply {
        if let Err(err) = invocation.validate() {
            tracing::debug!(caller = %invocation.caller.id, error = %err, "rejected invocation");
            return CommandReply::failure(err.to_string());
        }
        match self.commands.get(&invocation.name) {
            Some(handler) => handler(invocation).await,
            None => {
                tracing::debug!(command = %invocation.name, "unknown command");
                CommandReply::failure(format!("unknown command '{}'", invocation.name))
            }
        }
    }

    /// Publishes events from `events` until the sender side closes, then
    /// waits for the handlers still in flight.
    ///
    /// A panicking handler is logged and does not stop the loop.
    pub async fn run(&self, mut events: mpsc::Receiver<GatewayEvent>) {
        let mut in_flight = JoinSet::new();
        while let Some(event) = events.recv().await {
            let kind = event.kind();
            for handler in self.handlers.get(&kind).into_iter().flatten() {
                in_flight.spawn(handler(event.clone()));
            }
            while let Some(finished) = in_flight.try_join_next() {
                log_join_result(finished);
            }
        }

        tracing::debug!(pending = in_flight.len(), "event stream closed, draining handlers");
        while let Some(finished) = in_flight.join_next().await {
            log_join_result(finished);
        }
    }
}

impl Gateway for EventBus {
    fn subscribe(&mut self, kind: EventKind, handler: EventHandler) {
        self.handlers.entry(kind).or_default().push(handler);
    }

    fn register_command(&mut self, name: &str, handler: CommandHandler) {
        if self.commands.insert(name.to_string(), handler).is_some() {
            tracing::warn!(command = name, "command handler replaced");
        }
    }
}

fn log_join_result(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        tracing::error!(error = %e, "event handler panicked");
    }
}
