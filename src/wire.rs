//! JSON frame codec for the chat socket protocol.
//!
//! Every frame on the wire is a single JSON object. Client frames carry an
//! event name, an optional payload and an optional ack id; the server answers
//! acked frames with an `"ack"` frame echoing the id and carrying either a
//! result payload or an error string. Server pushes are plain event frames
//! with no ack id.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::message::MessageType;

/// Event names, client to server.
pub mod c2s {
    pub const CONVERSATION_JOIN: &str = "conversation:join";
    pub const CONVERSATION_LEAVE: &str = "conversation:leave";
    pub const CONVERSATION_MARK_ALL_READ: &str = "conversation:mark-all-read";
    pub const MESSAGE_SEND: &str = "message:send";
    pub const TYPING_START: &str = "typing:start";
    pub const TYPING_STOP: &str = "typing:stop";
    pub const PING: &str = "ping";
}

/// Event names, server to client.
pub mod s2c {
    pub const MESSAGE_NEW: &str = "message:new";
    pub const NOTIFICATION_NEW_MESSAGE: &str = "notification:new-message";
    pub const TYPING_USER_TYPING: &str = "typing:user-typing";
    pub const TYPING_USER_STOPPED: &str = "typing:user-stopped";
    pub const MESSAGE_READ_RECEIPT: &str = "message:read-receipt";
    pub const CONVERSATION_ALL_READ: &str = "conversation:all-read";
    pub const USER_ONLINE: &str = "user:online";
    pub const USER_OFFLINE: &str = "user:offline";
    pub const ERROR: &str = "error";
    pub const ACK: &str = "ack";
}

/// A frame emitted by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientFrame {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ack: Option<String>,
}

impl ClientFrame {
    pub fn new(event: &str, data: Option<Value>) -> Self {
        Self {
            event: event.to_string(),
            data,
            ack: None,
        }
    }

    pub fn with_ack(mut self, ack_id: impl Into<String>) -> Self {
        self.ack = Some(ack_id.into());
        self
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// A frame received from the server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub ack: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ServerFrame {
    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    /// True if this frame is the server's response to an acked client frame.
    pub fn is_ack(&self) -> bool {
        self.event == s2c::ACK
    }
}

/// Payload for room membership and bulk-read requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRef {
    pub conversation_id: String,
}

impl RoomRef {
    pub fn new(conversation_id: &str) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
        }
    }
}

/// Payload for `message:send`. Exactly one of `content`/`media_id` is set,
/// matching the message type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub conversation_id: String,
    pub message_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
    pub temp_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_frame_serializes_without_empty_fields() {
        let frame = ClientFrame::new(c2s::TYPING_START, Some(json!({"conversationId": "c1"})));
        let text = String::from_utf8(frame.to_bytes().unwrap()).unwrap();
        assert!(text.contains("\"event\":\"typing:start\""));
        assert!(!text.contains("ack"));
    }

    #[test]
    fn client_frame_round_trips_ack_id() {
        let frame = ClientFrame::new(c2s::MESSAGE_SEND, Some(json!({}))).with_ack("42.7-1");
        let bytes = frame.to_bytes().unwrap();
        let parsed: ClientFrame = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.ack.as_deref(), Some("42.7-1"));
    }

    #[test]
    fn server_frame_tolerates_missing_data() {
        let frame = ServerFrame::from_bytes(br#"{"event":"conversation:all-read"}"#).unwrap();
        assert_eq!(frame.event, s2c::CONVERSATION_ALL_READ);
        assert!(frame.data.is_null());
        assert!(!frame.is_ack());
    }

    #[test]
    fn server_ack_frame_with_error_is_detected() {
        let frame =
            ServerFrame::from_bytes(br#"{"event":"ack","ack":"1.2-0","error":"rejected"}"#)
                .unwrap();
        assert!(frame.is_ack());
        assert_eq!(frame.error.as_deref(), Some("rejected"));
    }

    #[test]
    fn send_payload_omits_unused_body_field() {
        let payload = SendMessagePayload {
            conversation_id: "c1".into(),
            message_type: MessageType::Text,
            content: Some("hello".into()),
            media_id: None,
            temp_id: "tmp-1".into(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["conversationId"], "c1");
        assert_eq!(value["messageType"], "text");
        assert!(value.get("mediaId").is_none());
    }
}
