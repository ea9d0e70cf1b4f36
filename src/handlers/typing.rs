use super::traits::EventHandler;
use crate::client::Client;
use crate::types::events::{TypingStopped, TypingUpdate};
use crate::wire::{ServerFrame, s2c};
use async_trait::async_trait;
use log::warn;
use std::sync::Arc;

/// Handler for the peer typing signals (`typing:user-typing` and
/// `typing:user-stopped`). Register one instance per direction.
pub struct TypingHandler {
    stopped: bool,
}

impl TypingHandler {
    pub fn started() -> Self {
        Self { stopped: false }
    }

    pub fn stopped() -> Self {
        Self { stopped: true }
    }
}

#[async_trait]
impl EventHandler for TypingHandler {
    fn event(&self) -> &'static str {
        if self.stopped {
            s2c::TYPING_USER_STOPPED
        } else {
            s2c::TYPING_USER_TYPING
        }
    }

    async fn handle(&self, client: Arc<Client>, frame: &ServerFrame) -> bool {
        if self.stopped {
            let event: TypingStopped = match serde_json::from_value(frame.data.clone()) {
                Ok(event) => event,
                Err(e) => {
                    warn!(target: "Client/Recv", "Malformed typing-stopped payload: {e}");
                    return true;
                }
            };
            let _ = client.event_bus.typing_stopped.send(Arc::new(event));
        } else {
            let event: TypingUpdate = match serde_json::from_value(frame.data.clone()) {
                Ok(event) => event,
                Err(e) => {
                    warn!(target: "Client/Recv", "Malformed typing payload: {e}");
                    return true;
                }
            };
            let _ = client.event_bus.typing.send(Arc::new(event));
        }
        true
    }
}
