use super::traits::EventHandler;
use crate::client::Client;
use crate::types::events::MessageNew;
use crate::wire::{ServerFrame, s2c};
use async_trait::async_trait;
use log::warn;
use std::sync::Arc;

/// Handler for `message:new`: a live message pushed into a joined room.
#[derive(Default)]
pub struct MessageHandler;

#[async_trait]
impl EventHandler for MessageHandler {
    fn event(&self) -> &'static str {
        s2c::MESSAGE_NEW
    }

    async fn handle(&self, client: Arc<Client>, frame: &ServerFrame) -> bool {
        let event: MessageNew = match serde_json::from_value(frame.data.clone()) {
            Ok(event) => event,
            Err(e) => {
                warn!(target: "Client/Recv", "Malformed message:new payload: {e}");
                return true;
            }
        };
        let _ = client.event_bus.message.send(Arc::new(event));
        true
    }
}
