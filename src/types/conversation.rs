use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::MessageType;

/// Which side of a support conversation a user is on. Admins act with
/// support-side privileges plus reassignment rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Farmer,
    Support,
    Admin,
}

impl ParticipantRole {
    pub fn is_staff(&self) -> bool {
        matches!(self, ParticipantRole::Support | ParticipantRole::Admin)
    }
}

/// A conversation participant reference, denormalized for list rendering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Server-authoritative conversation status. Only support/admin actors may
/// change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Open,
    Waiting,
    Resolved,
    Closed,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Open => "open",
            ConversationStatus::Waiting => "waiting",
            ConversationStatus::Resolved => "resolved",
            ConversationStatus::Closed => "closed",
        }
    }
}

/// Per-participant unread counters. The server increments the counter of the
/// non-sender on delivery and zeroes it on mark-all-read.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCounts {
    #[serde(default)]
    pub farmer: u32,
    #[serde(default)]
    pub support: u32,
}

impl UnreadCounts {
    /// Unread count as seen by a participant with the given role.
    pub fn for_role(&self, role: ParticipantRole) -> u32 {
        match role {
            ParticipantRole::Farmer => self.farmer,
            ParticipantRole::Support | ParticipantRole::Admin => self.support,
        }
    }
}

/// Denormalized last-message snapshot for list rendering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub message_type: MessageType,
    #[serde(default)]
    pub preview: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A 1:1 support thread between a farmer and an assigned support agent.
///
/// Conversations are created lazily on first farmer contact (find-or-create)
/// and never hard-deleted from the client's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(rename = "_id")]
    pub id: String,
    pub farmer: Participant,
    #[serde(default)]
    pub assigned_support: Option<Participant>,
    pub status: ConversationStatus,
    #[serde(default)]
    pub last_message: Option<LastMessage>,
    #[serde(default)]
    pub unread_counts: UnreadCounts,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// The participant on the other side from the given user, if known.
    pub fn peer_of(&self, user_id: &str) -> Option<&Participant> {
        if self.farmer.id == user_id {
            self.assigned_support.as_ref()
        } else {
            Some(&self.farmer)
        }
    }
}

/// Conversation statistics as reported by the stats endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationStats {
    pub total: u64,
    pub active: u64,
    #[serde(default)]
    pub by_status: Vec<StatusCount>,
    #[serde(default)]
    pub by_agent: Vec<AgentCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: ConversationStatus,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCount {
    pub agent_id: String,
    #[serde(default)]
    pub agent_name: Option<String>,
    pub count: u64,
}
