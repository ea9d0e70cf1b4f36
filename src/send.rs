//! Outbound message protocol for an open session.
//!
//! Every send goes through `message:send` with a client-generated `tempId`
//! and a server ack. Failed sends are never retried automatically and never
//! inserted into the transcript; confirmed messages arrive through the ack
//! payload or the room broadcast, whichever lands first.

use log::warn;
use std::time::Instant;
use thiserror::Error;

use crate::request::AckError;
use crate::rest::RestError;
use crate::session::ConversationSession;
use crate::types::message::{ChatMessage, MediaRef, MessageType};
use crate::upload::{MediaError, OutgoingAttachment, validate_attachment};
use crate::wire::{SendMessagePayload, c2s};

#[derive(Debug, Error)]
pub enum SendError {
    #[error("client is not connected")]
    NotConnected,
    #[error("another send is still in flight")]
    SendInFlight,
    #[error("message is empty")]
    EmptyMessage,
    #[error("no conversation is open")]
    NoOpenConversation,
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error("media upload failed: {0}")]
    Upload(#[from] RestError),
    #[error("payload encode failed: {0}")]
    Encode(#[from] serde_json::Error),
    /// The server did not acknowledge the emit. For media messages,
    /// `media_id` and `uploaded` identify objects that are already stored
    /// server-side; callers may retry the emit with the same media id
    /// instead of re-uploading.
    #[error("send {temp_id} was not acknowledged: {source}")]
    Emit {
        temp_id: String,
        media_id: Option<String>,
        uploaded: Vec<MediaRef>,
        #[source]
        source: AckError,
    },
}

/// Lifecycle of one optimistic send, keyed by its tempId.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingState {
    Pending,
    Acked,
    Failed,
}

#[derive(Debug, Clone)]
pub struct PendingSend {
    pub temp_id: String,
    pub media_id: Option<String>,
    pub state: PendingState,
    pub started_at: Instant,
}

impl ConversationSession {
    /// Sends a text message. Returns the tempId correlating the send.
    pub async fn send_text(&mut self, text: &str) -> Result<String, SendError> {
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(SendError::EmptyMessage);
        }

        let conversation_id = self.begin_send()?;
        let result = self.send_text_inner(&conversation_id, &text).await;
        self.send_in_flight = false;
        result
    }

    /// Uploads attachments and sends them as individual media messages,
    /// followed by the caption as a separate text message when present.
    /// Returns the tempIds of every message emitted, in emit order.
    pub async fn send_attachments(
        &mut self,
        attachments: Vec<OutgoingAttachment>,
        caption: Option<&str>,
    ) -> Result<Vec<String>, SendError> {
        if attachments.is_empty() {
            return Err(SendError::EmptyMessage);
        }

        // Validation happens before the duplicate-send guard engages and
        // before any network call, so a bad file never costs an upload.
        let limits = self.client.config().media_limits;
        let mut kinds = Vec::with_capacity(attachments.len());
        for attachment in &attachments {
            kinds.push(validate_attachment(&limits, attachment)?);
        }

        let conversation_id = self.begin_send()?;
        let result = self
            .send_attachments_inner(&conversation_id, &attachments, kinds, caption)
            .await;
        self.send_in_flight = false;
        result
    }

    /// Observable state of a pending send, for UIs that render spinners.
    pub fn pending_state(&self, temp_id: &str) -> Option<PendingState> {
        self.pending_sends.get(temp_id).map(|p| p.state)
    }

    /// Shared entry guard: duplicate-send protection first, then the
    /// connectivity gate (no emit is ever attempted while disconnected).
    fn begin_send(&mut self) -> Result<String, SendError> {
        if self.send_in_flight {
            return Err(SendError::SendInFlight);
        }
        if !self.client.is_connected() {
            return Err(SendError::NotConnected);
        }
        let Some(conversation_id) = self.conversation().map(|c| c.id.clone()) else {
            return Err(SendError::NoOpenConversation);
        };
        self.sweep_pending(Instant::now());
        self.send_in_flight = true;
        Ok(conversation_id)
    }

    async fn send_text_inner(
        &mut self,
        conversation_id: &str,
        text: &str,
    ) -> Result<String, SendError> {
        let payload = SendMessagePayload {
            conversation_id: conversation_id.to_string(),
            message_type: MessageType::Text,
            content: Some(text.to_string()),
            media_id: None,
            temp_id: self.client.generate_temp_id(),
        };
        self.emit_and_confirm(payload, None, Vec::new()).await
    }

    async fn send_attachments_inner(
        &mut self,
        conversation_id: &str,
        attachments: &[OutgoingAttachment],
        kinds: Vec<MessageType>,
        caption: Option<&str>,
    ) -> Result<Vec<String>, SendError> {
        let uploaded = self.api.upload_chat_media(attachments).await?;
        if uploaded.len() != attachments.len() {
            warn!(
                target: "Session/Send",
                "Upload returned {} media objects for {} files",
                uploaded.len(),
                attachments.len()
            );
        }

        let mut temp_ids = Vec::with_capacity(uploaded.len() + 1);

        // Media messages go out first, the caption last, as distinct
        // messages that render temporally adjacent.
        for (media, kind) in uploaded.iter().zip(kinds) {
            let payload = SendMessagePayload {
                conversation_id: conversation_id.to_string(),
                message_type: kind,
                content: None,
                media_id: Some(media.id.clone()),
                temp_id: self.client.generate_temp_id(),
            };
            let temp_id = self
                .emit_and_confirm(payload, Some(media.id.clone()), uploaded.clone())
                .await?;
            temp_ids.push(temp_id);
        }

        if let Some(caption) = caption.map(str::trim).filter(|c| !c.is_empty()) {
            let payload = SendMessagePayload {
                conversation_id: conversation_id.to_string(),
                message_type: MessageType::Text,
                content: Some(caption.to_string()),
                media_id: None,
                temp_id: self.client.generate_temp_id(),
            };
            let temp_id = self
                .emit_and_confirm(payload, None, uploaded.clone())
                .await?;
            temp_ids.push(temp_id);
        }

        Ok(temp_ids)
    }

    async fn emit_and_confirm(
        &mut self,
        payload: SendMessagePayload,
        media_id: Option<String>,
        uploaded: Vec<MediaRef>,
    ) -> Result<String, SendError> {
        let temp_id = payload.temp_id.clone();
        self.pending_sends.insert(
            temp_id.clone(),
            PendingSend {
                temp_id: temp_id.clone(),
                media_id: media_id.clone(),
                state: PendingState::Pending,
                started_at: Instant::now(),
            },
        );

        let value = serde_json::to_value(&payload)?;
        let result = self
            .client
            .emit_with_ack(c2s::MESSAGE_SEND, Some(value), None)
            .await;
        match result {
            Ok(ack) => {
                self.pending_sends.remove(&temp_id);
                if let Some(message) = parse_ack_message(&ack) {
                    if self.is_current(&message.conversation_id) {
                        self.insert_live(message);
                    }
                }
                Ok(temp_id)
            }
            Err(source) => {
                if let Some(pending) = self.pending_sends.get_mut(&temp_id) {
                    pending.state = PendingState::Failed;
                }
                Err(SendError::Emit {
                    temp_id,
                    media_id,
                    uploaded,
                    source,
                })
            }
        }
    }
}

/// The ack payload carries the confirmed message either directly or under a
/// `message` key, depending on backend version.
fn parse_ack_message(ack: &serde_json::Value) -> Option<ChatMessage> {
    if let Some(inner) = ack.get("message") {
        if let Ok(message) = serde_json::from_value(inner.clone()) {
            return Some(message);
        }
    }
    serde_json::from_value(ack.clone()).ok()
}
