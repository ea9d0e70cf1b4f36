use super::traits::EventHandler;
use crate::client::Client;
use crate::types::events::NewMessageNotification;
use crate::wire::{ServerFrame, s2c};
use async_trait::async_trait;
use log::warn;
use std::sync::Arc;

/// Handler for `notification:new-message`: a message arriving for a
/// conversation the client has not joined. Routed to the background
/// notification channel, never to the live transcript channel.
#[derive(Default)]
pub struct NotificationHandler;

#[async_trait]
impl EventHandler for NotificationHandler {
    fn event(&self) -> &'static str {
        s2c::NOTIFICATION_NEW_MESSAGE
    }

    async fn handle(&self, client: Arc<Client>, frame: &ServerFrame) -> bool {
        let event: NewMessageNotification = match serde_json::from_value(frame.data.clone()) {
            Ok(event) => event,
            Err(e) => {
                warn!(target: "Client/Recv", "Malformed notification payload: {e}");
                return true;
            }
        };
        let _ = client.event_bus.notification.send(Arc::new(event));
        true
    }
}
