//! Typed event subscription for UI components.
//!
//! A component implements [`ChatEvents`] for the callbacks it cares about and
//! attaches it with [`EventCoordinator::attach`]. The returned handle owns
//! one forwarding task per event channel; dropping it (or calling
//! [`CoordinatorHandle::detach`]) deregisters everything, so re-attaching on
//! a dependency change can never leak listeners.

use log::debug;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::NotificationOptions;
use crate::types::events::{
    ConversationRead, EventBus, MessageNew, NewMessageNotification, PresenceUpdate, ReadReceipt,
    SocketError, TypingStopped, TypingUpdate,
};

/// Which side effects the embedder should perform for a background
/// notification, resolved from the coordinator's [`NotificationOptions`].
#[derive(Debug, Clone, Copy)]
pub struct NotificationEffects {
    pub play_sound: bool,
    pub show_desktop: bool,
}

/// One method per chat event. All methods default to no-ops so subscribers
/// implement only what they render.
///
/// Callbacks run on the coordinator's forwarding tasks and must not block.
pub trait ChatEvents: Send + Sync + 'static {
    fn on_connected(&self) {}
    fn on_disconnected(&self) {}
    /// Live message for an open session's transcript.
    fn on_message(&self, _event: &MessageNew) {}
    /// Message for a conversation without an open session. `effects` carries
    /// the resolved sound/desktop toggles.
    fn on_notification(&self, _event: &NewMessageNotification, _effects: NotificationEffects) {}
    fn on_typing(&self, _event: &TypingUpdate) {}
    fn on_typing_stopped(&self, _event: &TypingStopped) {}
    fn on_read_receipt(&self, _event: &ReadReceipt) {}
    fn on_conversation_read(&self, _event: &ConversationRead) {}
    fn on_presence(&self, _event: &PresenceUpdate) {}
    fn on_socket_error(&self, _event: &SocketError) {}
}

/// Registration handle. Aborts every forwarding task on drop.
pub struct CoordinatorHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl CoordinatorHandle {
    /// Explicitly deregister all callbacks. Equivalent to dropping.
    pub fn detach(mut self) {
        self.abort_all();
    }

    fn abort_all(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for CoordinatorHandle {
    fn drop(&mut self) {
        self.abort_all();
    }
}

pub struct EventCoordinator;

// Spawns a task that forwards one broadcast channel into one subscriber
// method. Lagged receivers skip ahead; a closed channel ends the task.
macro_rules! forward {
    ($tasks:expr, $channel:expr, $subscriber:expr, |$sub:ident, $event:ident| $body:expr) => {{
        let mut rx = $channel.subscribe();
        let $sub = $subscriber.clone();
        $tasks.push(tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok($event) => $body,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(target: "Coordinator", "Subscriber lagged, skipped {skipped} events");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }));
    }};
}

impl EventCoordinator {
    /// Registers `subscriber` against every event channel of `bus`.
    ///
    /// The registration lives exactly as long as the returned handle.
    pub fn attach(
        bus: &EventBus,
        subscriber: Arc<dyn ChatEvents>,
        options: NotificationOptions,
    ) -> CoordinatorHandle {
        let effects = NotificationEffects {
            play_sound: options.sound,
            show_desktop: options.desktop,
        };

        let mut tasks = Vec::new();

        forward!(tasks, bus.connected, subscriber, |sub, _event| {
            sub.on_connected()
        });
        forward!(tasks, bus.disconnected, subscriber, |sub, _event| {
            sub.on_disconnected()
        });
        forward!(tasks, bus.message, subscriber, |sub, event| {
            sub.on_message(&event)
        });
        forward!(tasks, bus.notification, subscriber, |sub, event| {
            sub.on_notification(&event, effects)
        });
        forward!(tasks, bus.typing, subscriber, |sub, event| {
            sub.on_typing(&event)
        });
        forward!(tasks, bus.typing_stopped, subscriber, |sub, event| {
            sub.on_typing_stopped(&event)
        });
        forward!(tasks, bus.read_receipt, subscriber, |sub, event| {
            sub.on_read_receipt(&event)
        });
        forward!(tasks, bus.conversation_read, subscriber, |sub, event| {
            sub.on_conversation_read(&event)
        });
        forward!(tasks, bus.presence, subscriber, |sub, event| {
            sub.on_presence(&event)
        });
        forward!(tasks, bus.socket_error, subscriber, |sub, event| {
            sub.on_socket_error(&event)
        });

        CoordinatorHandle { tasks }
    }
}
