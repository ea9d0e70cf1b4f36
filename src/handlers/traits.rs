use crate::client::Client;
use crate::wire::ServerFrame;
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for handling one named server event.
///
/// Each handler decodes the frame payload for its event and publishes the
/// typed result on the client's event bus. This keeps the dispatch loop free
/// of per-event knowledge and makes new events additive.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// The server event name this handler is responsible for.
    fn event(&self) -> &'static str;

    /// Asynchronously handle the incoming frame.
    ///
    /// Returns `true` if the frame was consumed, `false` if it should be
    /// logged as unhandled.
    async fn handle(&self, client: Arc<Client>, frame: &ServerFrame) -> bool;
}
