use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transient per-user presence. Never persisted; always an ephemeral overlay
/// on cached participant data, updated by push events only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceState {
    pub is_online: bool,
    /// Meaningful only while offline.
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

impl PresenceState {
    pub fn online() -> Self {
        Self {
            is_online: true,
            last_seen: None,
        }
    }

    pub fn offline(last_seen: Option<DateTime<Utc>>) -> Self {
        Self {
            is_online: false,
            last_seen,
        }
    }
}
