use super::traits::EventHandler;
use crate::client::Client;
use crate::wire::ServerFrame;
use std::collections::HashMap;
use std::sync::Arc;

/// Central router for dispatching server frames to their handlers.
///
/// Handlers are keyed by event name; dispatch is a single map lookup.
pub struct EventRouter {
    handlers: HashMap<&'static str, Arc<dyn EventHandler>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for its event name.
    ///
    /// # Panics
    /// Panics if a handler is already registered for the same event, to
    /// catch accidental overwrites during initialization.
    pub fn register(&mut self, handler: Arc<dyn EventHandler>) {
        let event = handler.event();
        if self.handlers.insert(event, handler).is_some() {
            panic!("Handler for event '{}' already registered", event);
        }
    }

    /// Dispatch a frame to its handler.
    ///
    /// Returns `true` if a handler was found and consumed the frame.
    pub async fn dispatch(&self, client: Arc<Client>, frame: &ServerFrame) -> bool {
        if let Some(handler) = self.handlers.get(frame.event.as_str()) {
            handler.handle(client, frame).await
        } else {
            false
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_client;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct MockHandler {
        event: &'static str,
        handled: AtomicBool,
    }

    impl MockHandler {
        fn new(event: &'static str) -> Self {
            Self {
                event,
                handled: AtomicBool::new(false),
            }
        }

        fn was_handled(&self) -> bool {
            self.handled.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EventHandler for MockHandler {
        fn event(&self) -> &'static str {
            self.event
        }

        async fn handle(&self, _client: Arc<Client>, _frame: &ServerFrame) -> bool {
            self.handled.store(true, Ordering::SeqCst);
            true
        }
    }

    fn frame(event: &str) -> ServerFrame {
        ServerFrame::from_bytes(format!(r#"{{"event":"{event}"}}"#).as_bytes()).unwrap()
    }

    #[test]
    fn registration_counts_handlers() {
        let mut router = EventRouter::new();
        router.register(Arc::new(MockHandler::new("test:event")));
        assert_eq!(router.handler_count(), 1);
    }

    #[test]
    #[should_panic(expected = "Handler for event 'test:event' already registered")]
    fn double_registration_panics() {
        let mut router = EventRouter::new();
        router.register(Arc::new(MockHandler::new("test:event")));
        router.register(Arc::new(MockHandler::new("test:event")));
    }

    #[tokio::test]
    async fn dispatch_reaches_registered_handler() {
        let mut router = EventRouter::new();
        let handler = Arc::new(MockHandler::new("test:event"));
        let handler_ref = handler.clone();
        router.register(handler);

        let (client, _handle) = create_test_client();
        assert!(router.dispatch(client, &frame("test:event")).await);
        assert!(handler_ref.was_handled());
    }

    #[tokio::test]
    async fn dispatch_returns_false_for_unknown_event() {
        let router = EventRouter::new();
        let (client, _handle) = create_test_client();
        assert!(!router.dispatch(client, &frame("unknown:event")).await);
    }
}
