//! List-level state for support agents and admins: paginated conversation
//! summaries with filters, live unread badges and presence propagation.
//!
//! Unread counts and presence update in place from push events: a row never
//! needs a refetch to stay current, and a fetch failure keeps the last
//! known-good page on screen.

use log::warn;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::client::Client;
use crate::rest::{ChatApi, ConversationQuery, RestError};
use crate::types::conversation::{
    Conversation, ConversationStats, ConversationStatus, LastMessage, ParticipantRole,
};
use crate::types::events::{ConversationRead, NewMessageNotification, PresenceUpdate};
use crate::types::presence::PresenceState;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Rest(#[from] RestError),
    #[error("only admins may {0}")]
    NotPermitted(&'static str),
}

pub struct ConversationDirectory {
    client: Arc<Client>,
    api: Arc<ChatApi>,
    viewer_role: ParticipantRole,

    query: ConversationQuery,
    page: u32,
    page_size: u32,

    items: Vec<Conversation>,
    total: u64,
    total_pages: u32,

    /// Presence overlay for rendered rows, fed by push events only.
    presence: HashMap<String, PresenceState>,
    /// Unread counts adjusted by events since the last fetch, keyed by
    /// conversation id. Cleared whenever fresh server counts arrive.
    unread_overrides: HashMap<String, u32>,
}

impl ConversationDirectory {
    pub fn new(client: Arc<Client>, api: Arc<ChatApi>, viewer_role: ParticipantRole) -> Self {
        let page_size = client.config().list_page_size;
        Self {
            client,
            api,
            viewer_role,
            query: ConversationQuery::default(),
            page: 1,
            page_size,
            items: Vec::new(),
            total: 0,
            total_pages: 0,
            presence: HashMap::new(),
            unread_overrides: HashMap::new(),
        }
    }

    pub fn items(&self) -> &[Conversation] {
        &self.items
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    /// Fetches the current page with the current filters. On failure the
    /// previously fetched rows stay as-is.
    pub async fn refresh(&mut self) -> Result<(), RestError> {
        let fetched = self
            .api
            .list_conversations(&self.query, self.page, self.page_size)
            .await;
        match fetched {
            Ok(page) => {
                self.items = page.conversations;
                self.total = page.total;
                self.total_pages = page.total_pages;
                self.page = page.page;
                self.unread_overrides.clear();
                self.seed_presence_from_client();
                Ok(())
            }
            Err(e) => {
                warn!(target: "Directory", "Conversation list fetch failed: {e}");
                Err(e)
            }
        }
    }

    /// Free-text search by participant name. Resets to page 1.
    pub fn set_search(&mut self, search: Option<String>) {
        let search = search.filter(|s| !s.is_empty());
        if self.query.search != search {
            self.query.search = search;
            self.page = 1;
        }
    }

    /// Status filter. Resets to page 1.
    pub fn set_status(&mut self, status: Option<ConversationStatus>) {
        if self.query.status != status {
            self.query.status = status;
            self.page = 1;
        }
    }

    /// Assigned-agent filter; admin only. Resets to page 1.
    pub fn set_assigned_agent(
        &mut self,
        agent_id: Option<String>,
    ) -> Result<(), DirectoryError> {
        if self.viewer_role != ParticipantRole::Admin {
            return Err(DirectoryError::NotPermitted("filter by assigned agent"));
        }
        if self.query.assigned_support != agent_id {
            self.query.assigned_support = agent_id;
            self.page = 1;
        }
        Ok(())
    }

    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
    }

    /// Unread badge for one row as seen by the viewer, including any live
    /// adjustments since the last fetch.
    pub fn unread_for(&self, conversation_id: &str) -> u32 {
        if let Some(&count) = self.unread_overrides.get(conversation_id) {
            return count;
        }
        self.items
            .iter()
            .find(|c| c.id == conversation_id)
            .map(|c| c.unread_counts.for_role(self.viewer_role))
            .unwrap_or(0)
    }

    /// Applies a background new-message notification: bumps the unread badge
    /// and refreshes the row's last-message snapshot without a refetch.
    pub fn apply_notification(&mut self, event: &NewMessageNotification) {
        let current = self.unread_for(&event.conversation_id);
        self.unread_overrides
            .insert(event.conversation_id.clone(), current + 1);

        if let Some(row) = self
            .items
            .iter_mut()
            .find(|c| c.id == event.conversation_id)
        {
            row.last_message = Some(LastMessage {
                message_type: event.message.message_type,
                preview: Some(event.message.preview_text()),
                timestamp: event.message.timestamp,
            });
        }
    }

    /// Applies a bulk-read confirmation: the viewer has read everything in
    /// the conversation, so its badge drops to zero.
    pub fn apply_all_read(&mut self, event: &ConversationRead) {
        self.unread_overrides
            .insert(event.conversation_id.clone(), 0);
        if let Some(row) = self
            .items
            .iter_mut()
            .find(|c| c.id == event.conversation_id)
        {
            match self.viewer_role {
                ParticipantRole::Farmer => row.unread_counts.farmer = 0,
                ParticipantRole::Support | ParticipantRole::Admin => {
                    row.unread_counts.support = 0
                }
            }
        }
    }

    /// Applies a presence push to every matching rendered row.
    pub fn apply_presence(&mut self, event: &PresenceUpdate) {
        let state = if event.is_online {
            PresenceState::online()
        } else {
            PresenceState::offline(event.last_seen)
        };
        self.presence.insert(event.user_id.clone(), state);
    }

    /// Presence for a participant on the rendered page, if known.
    pub fn presence_of(&self, user_id: &str) -> Option<PresenceState> {
        self.presence
            .get(user_id)
            .copied()
            .or_else(|| self.client.presence_of(user_id))
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.presence_of(user_id).map(|p| p.is_online).unwrap_or(false)
    }

    /// Admin-only: reassigns a conversation to a different support agent and
    /// refreshes the list on success.
    pub async fn reassign(
        &mut self,
        conversation_id: &str,
        agent_id: &str,
    ) -> Result<(), DirectoryError> {
        if self.viewer_role != ParticipantRole::Admin {
            return Err(DirectoryError::NotPermitted("reassign conversations"));
        }
        self.api.reassign(conversation_id, agent_id).await?;
        self.refresh().await?;
        Ok(())
    }

    /// Conversation statistics for the dashboard header.
    pub async fn stats(&self) -> Result<ConversationStats, RestError> {
        self.api.stats().await
    }

    fn seed_presence_from_client(&mut self) {
        for conversation in &self.items {
            for user_id in std::iter::once(conversation.farmer.id.as_str()).chain(
                conversation
                    .assigned_support
                    .as_ref()
                    .map(|p| p.id.as_str()),
            ) {
                if let Some(state) = self.client.presence_of(user_id) {
                    self.presence.insert(user_id.to_string(), state);
                }
            }
        }
    }
}
