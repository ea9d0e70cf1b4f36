use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a chat message. Media kinds carry a media reference instead of
/// inline text content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    Video,
    Audio,
}

impl MessageType {
    pub fn is_media(&self) -> bool {
        !matches!(self, MessageType::Text)
    }

    /// Maps an uploaded file's MIME type to a message type. Returns `None`
    /// for types the chat does not accept.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let top_level = mime.split('/').next().unwrap_or("");
        match top_level {
            "image" => Some(MessageType::Image),
            "video" => Some(MessageType::Video),
            "audio" => Some(MessageType::Audio),
            _ => None,
        }
    }

    /// Display label used for conversation list previews of media messages.
    pub fn preview_label(&self) -> &'static str {
        match self {
            MessageType::Text => "",
            MessageType::Image => "[photo]",
            MessageType::Video => "[video]",
            MessageType::Audio => "[voice note]",
        }
    }
}

/// A stored media object, as returned by the upload endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

/// A single chat message.
///
/// Messages are immutable after creation except for the read-state
/// transition, which is driven exclusively by server receipt events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(rename = "_id")]
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub message_type: MessageType,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub media: Option<MediaRef>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
    pub timestamp: DateTime<Utc>,
    /// Client correlation id echoed back by the server for the sender's own
    /// messages. Absent on everything else.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<String>,
}

impl ChatMessage {
    /// Text shown in list previews: message content for text messages, a
    /// media label otherwise.
    pub fn preview_text(&self) -> String {
        match self.message_type {
            MessageType::Text => self.content.clone().unwrap_or_default(),
            other => other.preview_label().to_string(),
        }
    }

    /// Checks the content/media exclusivity invariant for the message type.
    pub fn body_is_consistent(&self) -> bool {
        match self.message_type {
            MessageType::Text => self.content.is_some() && self.media.is_none(),
            _ => self.content.is_none() && self.media.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_message(content: &str) -> ChatMessage {
        ChatMessage {
            id: "m1".into(),
            conversation_id: "c1".into(),
            sender_id: "u1".into(),
            message_type: MessageType::Text,
            content: Some(content.into()),
            media: None,
            is_read: false,
            read_at: None,
            timestamp: Utc::now(),
            temp_id: None,
        }
    }

    #[test]
    fn mime_mapping_accepts_media_kinds_only() {
        assert_eq!(MessageType::from_mime("image/png"), Some(MessageType::Image));
        assert_eq!(MessageType::from_mime("video/mp4"), Some(MessageType::Video));
        assert_eq!(MessageType::from_mime("audio/ogg"), Some(MessageType::Audio));
        assert_eq!(MessageType::from_mime("application/pdf"), None);
        assert_eq!(MessageType::from_mime(""), None);
    }

    #[test]
    fn preview_uses_content_for_text_and_label_for_media() {
        assert_eq!(text_message("hello").preview_text(), "hello");

        let mut media = text_message("");
        media.message_type = MessageType::Image;
        media.content = None;
        media.media = Some(MediaRef {
            id: "media1".into(),
            url: "https://cdn/x.png".into(),
            name: None,
            format: None,
        });
        assert_eq!(media.preview_text(), "[photo]");
        assert!(media.body_is_consistent());
    }

    #[test]
    fn text_with_media_attached_is_inconsistent() {
        let mut msg = text_message("hello");
        msg.media = Some(MediaRef {
            id: "media1".into(),
            url: "https://cdn/x.png".into(),
            name: None,
            format: None,
        });
        assert!(!msg.body_is_consistent());
    }

    #[test]
    fn deserializes_server_shape() {
        let json = r#"{
            "_id": "m42",
            "conversationId": "c7",
            "senderId": "farmer-1",
            "messageType": "text",
            "content": "namaste",
            "timestamp": "2026-03-01T10:00:00Z"
        }"#;
        let msg: ChatMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.id, "m42");
        assert!(!msg.is_read);
        assert!(msg.temp_id.is_none());
    }
}
