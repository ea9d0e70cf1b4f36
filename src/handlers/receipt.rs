use super::traits::EventHandler;
use crate::client::Client;
use crate::types::events::{ConversationRead, ReadReceipt};
use crate::wire::{ServerFrame, s2c};
use async_trait::async_trait;
use log::warn;
use std::sync::Arc;

/// Handler for `message:read-receipt`: the peer's client confirmed viewing
/// a single message. The read timestamp is server-assigned.
#[derive(Default)]
pub struct ReadReceiptHandler;

#[async_trait]
impl EventHandler for ReadReceiptHandler {
    fn event(&self) -> &'static str {
        s2c::MESSAGE_READ_RECEIPT
    }

    async fn handle(&self, client: Arc<Client>, frame: &ServerFrame) -> bool {
        let event: ReadReceipt = match serde_json::from_value(frame.data.clone()) {
            Ok(event) => event,
            Err(e) => {
                warn!(target: "Client/Recv", "Malformed read-receipt payload: {e}");
                return true;
            }
        };
        let _ = client.event_bus.read_receipt.send(Arc::new(event));
        true
    }
}

/// Handler for `conversation:all-read`: bulk-read confirmation.
#[derive(Default)]
pub struct AllReadHandler;

#[async_trait]
impl EventHandler for AllReadHandler {
    fn event(&self) -> &'static str {
        s2c::CONVERSATION_ALL_READ
    }

    async fn handle(&self, client: Arc<Client>, frame: &ServerFrame) -> bool {
        let event: ConversationRead = match serde_json::from_value(frame.data.clone()) {
            Ok(event) => event,
            Err(e) => {
                warn!(target: "Client/Recv", "Malformed all-read payload: {e}");
                return true;
            }
        };
        let _ = client.event_bus.conversation_read.send(Arc::new(event));
        true
    }
}
