use super::traits::EventHandler;
use crate::client::Client;
use crate::types::events::SocketError;
use crate::wire::{ServerFrame, s2c};
use async_trait::async_trait;
use log::warn;
use std::sync::Arc;

/// Handler for server `error` pushes. Logged and forwarded so the UI can
/// show a transient notice; never fatal to the connection.
#[derive(Default)]
pub struct ErrorHandler;

#[async_trait]
impl EventHandler for ErrorHandler {
    fn event(&self) -> &'static str {
        s2c::ERROR
    }

    async fn handle(&self, client: Arc<Client>, frame: &ServerFrame) -> bool {
        let event: SocketError = serde_json::from_value(frame.data.clone()).unwrap_or_else(|_| {
            SocketError {
                message: frame.data.to_string(),
            }
        });
        warn!(target: "Client", "Server error event: {}", event.message);
        let _ = client.event_bus.socket_error.send(Arc::new(event));
        true
    }
}
