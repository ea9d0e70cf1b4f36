use super::traits::EventHandler;
use crate::client::Client;
use crate::types::events::PresenceUpdate;
use crate::types::presence::PresenceState;
use crate::wire::{ServerFrame, s2c};
use async_trait::async_trait;
use log::warn;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresencePayload {
    user_id: String,
    #[serde(default)]
    last_seen: Option<chrono::DateTime<chrono::Utc>>,
}

/// Handler for `user:online` / `user:offline`.
///
/// Updates the client's process-wide presence overlay before publishing, so
/// directory rows and sessions read a consistent snapshot.
pub struct PresenceHandler {
    online: bool,
}

impl PresenceHandler {
    pub fn online() -> Self {
        Self { online: true }
    }

    pub fn offline() -> Self {
        Self { online: false }
    }
}

#[async_trait]
impl EventHandler for PresenceHandler {
    fn event(&self) -> &'static str {
        if self.online {
            s2c::USER_ONLINE
        } else {
            s2c::USER_OFFLINE
        }
    }

    async fn handle(&self, client: Arc<Client>, frame: &ServerFrame) -> bool {
        let payload: PresencePayload = match serde_json::from_value(frame.data.clone()) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(target: "Client/Recv", "Malformed presence payload: {e}");
                return true;
            }
        };

        let state = if self.online {
            PresenceState::online()
        } else {
            PresenceState::offline(payload.last_seen)
        };
        client.presence.insert(payload.user_id.clone(), state);

        let _ = client.event_bus.presence.send(Arc::new(PresenceUpdate {
            user_id: payload.user_id,
            is_online: self.online,
            last_seen: payload.last_seen,
        }));
        true
    }
}
