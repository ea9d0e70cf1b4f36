use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use super::conversation::Participant;
use super::message::ChatMessage;

// The size of the broadcast channel buffer.
const CHANNEL_CAPACITY: usize = 100;

/// The socket connected (or reconnected).
#[derive(Debug, Clone, Serialize)]
pub struct Connected;

/// The socket dropped. Send controls should disable until the next
/// [`Connected`].
#[derive(Debug, Clone, Serialize)]
pub struct Disconnected;

/// A live message pushed into a joined conversation room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageNew {
    pub conversation_id: String,
    pub message: ChatMessage,
}

/// A message arrived for a conversation the client has not joined. Intended
/// for background alerts (sound, desktop notification, badge bump).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessageNotification {
    pub conversation_id: String,
    pub sender: Participant,
    pub message: ChatMessage,
}

/// The peer started typing in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingUpdate {
    pub conversation_id: String,
    pub user_name: String,
}

/// The peer stopped typing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingStopped {
    pub conversation_id: String,
    pub user_name: String,
}

/// The recipient's client confirmed viewing a single message. The read
/// timestamp is server-assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub conversation_id: String,
    pub message_id: String,
    pub read_at: DateTime<Utc>,
}

/// Bulk-read confirmation for a whole conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRead {
    pub conversation_id: String,
}

/// A participant went online or offline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdate {
    pub user_id: String,
    pub is_online: bool,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

/// A transport or protocol error pushed by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketError {
    #[serde(default)]
    pub message: String,
}

// Macro to generate EventBus fields and constructor
macro_rules! define_event_bus {
    ($(($field:ident, $type:ty)),* $(,)?) => {
        /// Typed event bus with a separate broadcast channel per event
        /// category, so consumers subscribe only to what they render.
        #[derive(Debug)]
        pub struct EventBus {
            $(
                pub $field: broadcast::Sender<$type>,
            )*
        }

        impl EventBus {
            pub fn new() -> Self {
                Self {
                    $(
                        $field: broadcast::channel(CHANNEL_CAPACITY).0,
                    )*
                }
            }
        }
    };
}

define_event_bus! {
    // Connection events
    (connected, Arc<Connected>),
    (disconnected, Arc<Disconnected>),

    // Message events
    (message, Arc<MessageNew>),
    (notification, Arc<NewMessageNotification>),
    (read_receipt, Arc<ReadReceipt>),
    (conversation_read, Arc<ConversationRead>),

    // Presence-adjacent events
    (typing, Arc<TypingUpdate>),
    (typing_stopped, Arc<TypingStopped>),
    (presence, Arc<PresenceUpdate>),

    // Error events
    (socket_error, Arc<SocketError>),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bus_delivers_to_multiple_subscribers() {
        let bus = EventBus::new();
        let mut rx1 = bus.conversation_read.subscribe();
        let mut rx2 = bus.conversation_read.subscribe();

        bus.conversation_read
            .send(Arc::new(ConversationRead {
                conversation_id: "c1".into(),
            }))
            .unwrap();

        assert_eq!(rx1.recv().await.unwrap().conversation_id, "c1");
        assert_eq!(rx2.recv().await.unwrap().conversation_id, "c1");
    }

    #[test]
    fn send_without_subscribers_is_not_an_error_path() {
        let bus = EventBus::new();
        // broadcast::Sender::send errs with no receivers; publishers ignore it.
        let result = bus.presence.send(Arc::new(PresenceUpdate {
            user_id: "u1".into(),
            is_online: true,
            last_seen: None,
        }));
        assert!(result.is_err());
    }
}
