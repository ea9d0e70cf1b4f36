//! Client-side live state for one actively open conversation view.
//!
//! The session owns the room membership protocol, the transcript merge
//! rules, read-state application and the typing debounce for a single
//! conversation. Socket events reach it through the embedder's event wiring
//! (see [`crate::coordinator`]); the session itself never subscribes.

use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::client::{Client, ClientError};
use crate::rest::{ChatApi, RestError};
use crate::send::PendingSend;
use crate::types::conversation::Conversation;
use crate::types::events::{ConversationRead, MessageNew, ReadReceipt, TypingStopped, TypingUpdate};
use crate::types::message::ChatMessage;
use crate::typing::{TypingSignal, TypingTimer};
use crate::wire::{RoomRef, c2s};

/// How long auto-scroll stays suppressed around a history back-fill, so
/// prepended pages never yank the view to the bottom.
pub const BACKFILL_SCROLL_SUPPRESSION: Duration = Duration::from_millis(500);

/// Pending optimistic sends older than this are swept.
pub(crate) const PENDING_SEND_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Loading,
    Ready,
    LoadingMore,
}

/// What the view should do with its scroll position after the last
/// transcript change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollHint {
    /// A live message was appended; scroll to bottom.
    Bottom,
    /// History was prepended (or a back-fill just happened); stay put.
    Stay,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] RestError),
    #[error("room request failed: {0}")]
    Room(#[from] ClientError),
}

pub struct ConversationSession {
    pub(crate) client: Arc<Client>,
    pub(crate) api: Arc<ChatApi>,
    /// The viewing participant's user id.
    pub(crate) self_id: String,

    conversation: Option<Conversation>,
    phase: SessionPhase,
    messages: Vec<ChatMessage>,
    known_ids: HashSet<String>,
    loaded_pages: u32,
    has_more_history: bool,

    pub(crate) pending_sends: HashMap<String, PendingSend>,
    pub(crate) send_in_flight: bool,

    typing: TypingTimer,
    peer_typing: Option<String>,

    suppress_autoscroll_until: Option<Instant>,
    scroll_hint: ScrollHint,
    focused: bool,
}

impl ConversationSession {
    pub fn new(client: Arc<Client>, api: Arc<ChatApi>, self_id: impl Into<String>) -> Self {
        Self {
            client,
            api,
            self_id: self_id.into(),
            conversation: None,
            phase: SessionPhase::Idle,
            messages: Vec::new(),
            known_ids: HashSet::new(),
            loaded_pages: 0,
            has_more_history: false,
            pending_sends: HashMap::new(),
            send_in_flight: false,
            typing: TypingTimer::default(),
            peer_typing: None,
            suppress_autoscroll_until: None,
            scroll_hint: ScrollHint::Stay,
            focused: true,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn conversation(&self) -> Option<&Conversation> {
        self.conversation.as_ref()
    }

    /// Transcript in display order: oldest first, newest last.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn has_more_history(&self) -> bool {
        self.has_more_history
    }

    /// Name of the peer currently typing, if any.
    pub fn peer_typing(&self) -> Option<&str> {
        self.peer_typing.as_deref()
    }

    pub fn scroll_hint(&self) -> ScrollHint {
        self.scroll_hint
    }

    /// Whether this view is the active/focused one. Incoming peer messages
    /// are only auto-marked read while focused.
    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    /// Opens a conversation: fetches metadata plus the first message page,
    /// then leaves the previous room, joins the new one and requests a bulk
    /// read, strictly in that order.
    ///
    /// Idempotent: re-opening the already-open conversation is a no-op, and
    /// calls while a load is in flight are ignored.
    pub async fn open(&mut self, conversation_id: &str) -> Result<(), SessionError> {
        if matches!(self.phase, SessionPhase::Loading | SessionPhase::LoadingMore) {
            debug!(target: "Session", "open({conversation_id}) ignored: load in flight");
            return Ok(());
        }
        if self.phase == SessionPhase::Ready
            && self.conversation.as_ref().is_some_and(|c| c.id == conversation_id)
        {
            return Ok(());
        }

        let previous_phase = self.phase;
        self.phase = SessionPhase::Loading;

        let conversation = match self.api.get_conversation(conversation_id).await {
            Ok(conversation) => conversation,
            Err(e) => {
                // Keep last-known-good state on fetch failure.
                self.phase = previous_phase;
                return Err(e.into());
            }
        };
        let page = match self
            .api
            .get_messages(conversation_id, 1, self.client.config().chat_page_size)
            .await
        {
            Ok(page) => page,
            Err(e) => {
                self.phase = previous_phase;
                return Err(e.into());
            }
        };

        let previous_room = self.conversation.as_ref().map(|c| c.id.clone());

        let has_more = page.has_more();
        self.known_ids = page.messages.iter().map(|m| m.id.clone()).collect();
        self.messages = page.messages;
        self.has_more_history = has_more;
        self.loaded_pages = 1;
        self.conversation = Some(conversation);
        self.pending_sends.clear();
        self.peer_typing = None;
        self.suppress_autoscroll_until = None;
        self.scroll_hint = ScrollHint::Bottom;
        self.phase = SessionPhase::Ready;

        // Room switch: leave the old room before joining the new one so the
        // shared socket never echoes events for a view no longer displayed.
        if let Some(previous) = previous_room {
            self.client.leave_conversation(&previous).await?;
        }
        self.client.join_conversation(conversation_id).await?;
        self.client.mark_conversation_read(conversation_id).await?;

        Ok(())
    }

    /// Back-fills one older history page, prepending without disturbing the
    /// scroll position. Returns how many messages were prepended.
    pub async fn load_older(&mut self) -> Result<usize, SessionError> {
        if self.phase != SessionPhase::Ready || !self.has_more_history {
            return Ok(0);
        }
        let Some(conversation_id) = self.conversation.as_ref().map(|c| c.id.clone()) else {
            return Ok(0);
        };

        self.phase = SessionPhase::LoadingMore;
        let page = match self
            .api
            .get_messages(
                &conversation_id,
                self.loaded_pages + 1,
                self.client.config().chat_page_size,
            )
            .await
        {
            Ok(page) => page,
            Err(e) => {
                self.phase = SessionPhase::Ready;
                return Err(e.into());
            }
        };

        let has_more = page.has_more();
        let mut older: Vec<ChatMessage> = page
            .messages
            .into_iter()
            .filter(|m| !self.known_ids.contains(&m.id))
            .collect();
        for message in &older {
            self.known_ids.insert(message.id.clone());
        }
        let prepended = older.len();

        // Prepend, never re-sort: the already-displayed tail keeps its order.
        older.append(&mut self.messages);
        self.messages = older;

        self.loaded_pages += 1;
        self.has_more_history = has_more;
        self.suppress_autoscroll_until = Some(Instant::now() + BACKFILL_SCROLL_SUPPRESSION);
        self.scroll_hint = ScrollHint::Stay;
        self.phase = SessionPhase::Ready;

        Ok(prepended)
    }

    /// Tears the session down: emits a pending typing stop, leaves the room
    /// and clears local state. Safe to call redundantly.
    pub async fn close(&mut self) {
        if let Some(signal) = self.typing.finish() {
            self.emit_typing_signal(signal).await;
        }
        if let Some(conversation_id) = self.conversation.as_ref().map(|c| c.id.clone()) {
            if let Err(e) = self.client.leave_conversation(&conversation_id).await {
                warn!(target: "Session", "Failed to leave {conversation_id} on close: {e}");
            }
        }

        self.conversation = None;
        self.messages.clear();
        self.known_ids.clear();
        self.pending_sends.clear();
        self.peer_typing = None;
        self.has_more_history = false;
        self.loaded_pages = 0;
        self.send_in_flight = false;
        self.phase = SessionPhase::Idle;
    }

    /// Applies a live `message:new` push.
    pub async fn handle_message(&mut self, event: &MessageNew) {
        if !self.is_current(&event.conversation_id) {
            return;
        }
        self.sweep_pending(Instant::now());

        if let Some(temp_id) = event.message.temp_id.as_deref() {
            // Server broadcast of our own optimistic send.
            self.pending_sends.remove(temp_id);
        }
        if !self.insert_live(event.message.clone()) {
            return;
        }

        let from_peer = event.message.sender_id != self.self_id;
        if from_peer {
            self.peer_typing = None;
        }

        // A peer message seen in the focused view is read right away; the
        // message's own read flag still waits for the server receipt.
        if from_peer && self.focused {
            if let Err(e) = self.client.mark_conversation_read(&event.conversation_id).await {
                warn!(target: "Session", "mark-all-read after incoming message failed: {e}");
            }
        }
    }

    /// Applies a `message:read-receipt` event. This is the only place a
    /// message's read state flips to true with a timestamp.
    pub fn handle_read_receipt(&mut self, event: &ReadReceipt) {
        if !self.is_current(&event.conversation_id) {
            return;
        }
        if let Some(message) = self.messages.iter_mut().find(|m| m.id == event.message_id) {
            message.is_read = true;
            message.read_at = Some(event.read_at);
        }
    }

    /// Applies a `conversation:all-read` bulk confirmation.
    pub fn handle_all_read(&mut self, event: &ConversationRead) {
        if !self.is_current(&event.conversation_id) {
            return;
        }
        for message in &mut self.messages {
            message.is_read = true;
        }
    }

    pub fn handle_typing(&mut self, event: &TypingUpdate) {
        if self.is_current(&event.conversation_id) {
            self.peer_typing = Some(event.user_name.clone());
        }
    }

    pub fn handle_typing_stopped(&mut self, event: &TypingStopped) {
        if self.is_current(&event.conversation_id) {
            self.peer_typing = None;
        }
    }

    /// Feeds an input-box change into the typing debounce, emitting
    /// `typing:start`/`typing:stop` as the timer dictates.
    pub async fn input_changed(&mut self, text: &str) {
        let signal = self.typing.note_input(Instant::now(), text.trim().is_empty());
        if let Some(signal) = signal {
            self.emit_typing_signal(signal).await;
        }
    }

    /// Fires the quiet-period typing stop once due. Call from the view's
    /// tick, scheduled by [`ConversationSession::typing_deadline`].
    pub async fn poll_typing(&mut self) {
        let signal = self.typing.poll(Instant::now());
        if let Some(signal) = signal {
            self.emit_typing_signal(signal).await;
        }
    }

    pub fn typing_deadline(&self) -> Option<Instant> {
        self.typing.deadline()
    }

    pub(crate) async fn emit_typing_signal(&self, signal: TypingSignal) {
        let Some(conversation_id) = self.conversation.as_ref().map(|c| c.id.clone()) else {
            return;
        };
        let event = match signal {
            TypingSignal::Start => c2s::TYPING_START,
            TypingSignal::Stop => c2s::TYPING_STOP,
        };
        let payload = match serde_json::to_value(RoomRef::new(&conversation_id)) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(target: "Session", "typing payload encode failed: {e}");
                return;
            }
        };
        // Typing is best-effort; a dead socket just means no indicator.
        if let Err(e) = self.client.emit(event, Some(payload)).await {
            debug!(target: "Session", "typing signal not sent: {e}");
        }
    }

    pub(crate) fn is_current(&self, conversation_id: &str) -> bool {
        self.conversation
            .as_ref()
            .is_some_and(|c| c.id == conversation_id)
    }

    /// Appends a message if unseen. Returns false for duplicates.
    pub(crate) fn insert_live(&mut self, message: ChatMessage) -> bool {
        if !self.known_ids.insert(message.id.clone()) {
            return false;
        }
        self.messages.push(message);
        self.scroll_hint = if self.autoscroll_suppressed(Instant::now()) {
            ScrollHint::Stay
        } else {
            ScrollHint::Bottom
        };
        true
    }

    fn autoscroll_suppressed(&self, now: Instant) -> bool {
        self.suppress_autoscroll_until.is_some_and(|until| now < until)
    }

    /// Drops pending-send entries older than their TTL.
    pub(crate) fn sweep_pending(&mut self, now: Instant) {
        self.pending_sends
            .retain(|_, pending| now.duration_since(pending.started_at) < PENDING_SEND_TTL);
    }
}
