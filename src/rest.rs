//! Typed REST consumption for the chat backend.
//!
//! Only request/response shapes are modeled; server behavior is out of
//! scope. Every call funnels failures into [`RestError`] so callers can keep
//! last-known-good state and surface a transient notice.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use thiserror::Error;

use crate::config::Config;
use crate::http::{HttpClient, HttpRequest};
use crate::types::conversation::{Conversation, ConversationStats, ConversationStatus};
use crate::types::message::ChatMessage;

#[derive(Debug, Error)]
pub enum RestError {
    #[error("request failed: {0}")]
    Http(anyhow::Error),
    #[error("server returned {code}: {body}")]
    Status { code: u16, body: String },
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Filter set for the conversation list. `assigned_support` is only honored
/// by the server for admin sessions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationQuery {
    pub search: Option<String>,
    pub status: Option<ConversationStatus>,
    pub assigned_support: Option<String>,
}

impl ConversationQuery {
    fn to_query_string(&self, page: u32, limit: u32) -> String {
        let mut parts = vec![format!("page={page}"), format!("limit={limit}")];
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            parts.push(format!("search={}", urlencoding::encode(search)));
        }
        if let Some(status) = self.status {
            parts.push(format!("status={}", status.as_str()));
        }
        if let Some(agent) = self.assigned_support.as_deref() {
            parts.push(format!("assignedSupportId={}", urlencoding::encode(agent)));
        }
        parts.join("&")
    }
}

/// One page of conversation summaries.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationPage {
    pub conversations: Vec<Conversation>,
    pub page: u32,
    pub total_pages: u32,
    pub total: u64,
}

/// One page of messages, newest-last (chronological order within the page).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub messages: Vec<ChatMessage>,
    pub page: u32,
    pub total_pages: u32,
    pub total: u64,
}

impl MessagePage {
    pub fn has_more(&self) -> bool {
        self.page < self.total_pages
    }
}

/// REST client bound to one authenticated session.
pub struct ChatApi {
    http: Arc<dyn HttpClient>,
    base_url: String,
    auth_token: String,
    pub(crate) media_base_url: String,
}

impl ChatApi {
    pub fn new(http: Arc<dyn HttpClient>, config: &Config) -> Self {
        Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
            media_base_url: config.media_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn authorized(&self, request: HttpRequest) -> HttpRequest {
        request.with_header("Authorization", format!("Bearer {}", self.auth_token))
    }

    pub(crate) async fn execute_json<T: DeserializeOwned>(
        &self,
        request: HttpRequest,
    ) -> Result<T, RestError> {
        let response = self.http.execute(request).await.map_err(RestError::Http)?;
        if response.status_code >= 400 {
            return Err(RestError::Status {
                code: response.status_code,
                body: response.body_string(),
            });
        }
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// Paged, filterable conversation list.
    pub async fn list_conversations(
        &self,
        query: &ConversationQuery,
        page: u32,
        limit: u32,
    ) -> Result<ConversationPage, RestError> {
        let url = format!(
            "{}?{}",
            self.url("/chat/conversations"),
            query.to_query_string(page, limit)
        );
        self.execute_json(self.authorized(HttpRequest::get(url)))
            .await
    }

    pub async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation, RestError> {
        let url = self.url(&format!("/chat/conversations/{conversation_id}"));
        self.execute_json(self.authorized(HttpRequest::get(url)))
            .await
    }

    /// Paged message history, newest-last. Page 1 is the most recent page.
    pub async fn get_messages(
        &self,
        conversation_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<MessagePage, RestError> {
        let url = format!(
            "{}?page={page}&limit={limit}",
            self.url(&format!("/chat/conversations/{conversation_id}/messages"))
        );
        self.execute_json(self.authorized(HttpRequest::get(url)))
            .await
    }

    /// Find-or-create semantics for the calling farmer: the server returns
    /// the existing conversation if one exists, never a duplicate.
    pub async fn create_or_get_conversation(&self) -> Result<Conversation, RestError> {
        let url = self.url("/chat/conversations/contact-support");
        self.execute_json(self.authorized(HttpRequest::post(url)))
            .await
    }

    /// Support/admin only; status transitions are server-authoritative.
    pub async fn update_status(
        &self,
        conversation_id: &str,
        status: ConversationStatus,
    ) -> Result<Conversation, RestError> {
        let url = self.url(&format!("/chat/conversations/{conversation_id}/status"));
        let body = serde_json::to_vec(&serde_json::json!({ "status": status }))?;
        let request = HttpRequest::patch(url)
            .with_header("Content-Type", "application/json")
            .with_body(body);
        self.execute_json(self.authorized(request)).await
    }

    /// Admin only: move the conversation to a different support agent.
    pub async fn reassign(
        &self,
        conversation_id: &str,
        agent_id: &str,
    ) -> Result<Conversation, RestError> {
        let url = self.url(&format!("/chat/conversations/{conversation_id}/assign"));
        let body = serde_json::to_vec(&serde_json::json!({ "assignedSupportId": agent_id }))?;
        let request = HttpRequest::patch(url)
            .with_header("Content-Type", "application/json")
            .with_body(body);
        self.execute_json(self.authorized(request)).await
    }

    /// Totals, active count and per-agent breakdown.
    pub async fn stats(&self) -> Result<ConversationStats, RestError> {
        let url = self.url("/chat/stats");
        self.execute_json(self.authorized(HttpRequest::get(url)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_string_includes_only_set_filters() {
        let query = ConversationQuery {
            search: Some("asha devi".into()),
            status: Some(ConversationStatus::Open),
            assigned_support: None,
        };
        assert_eq!(
            query.to_query_string(2, 20),
            "page=2&limit=20&search=asha%20devi&status=open"
        );
    }

    #[test]
    fn empty_search_is_omitted() {
        let query = ConversationQuery {
            search: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(query.to_query_string(1, 20), "page=1&limit=20");
    }

    #[test]
    fn message_page_knows_whether_more_history_exists() {
        let page: MessagePage = serde_json::from_str(
            r#"{"messages":[],"page":1,"totalPages":3,"total":120}"#,
        )
        .unwrap();
        assert!(page.has_more());

        let last: MessagePage = serde_json::from_str(
            r#"{"messages":[],"page":3,"totalPages":3,"total":120}"#,
        )
        .unwrap();
        assert!(!last.has_more());
    }
}
