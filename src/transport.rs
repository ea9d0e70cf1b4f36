pub use agrichat_tokio_transport::{
    TokioWebSocketTransportFactory, Transport, TransportEvent, TransportFactory,
};

/// Scripted in-memory transport for tests: records every frame the client
/// sends and lets the test inject server frames and connection drops.
pub mod mock {
    use super::*;
    use crate::wire::ClientFrame;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct MockState {
        sent: Mutex<Vec<Vec<u8>>>,
        event_tx: Mutex<Option<mpsc::Sender<TransportEvent>>>,
        fail_sends: AtomicBool,
    }

    pub struct MockTransport {
        state: Arc<MockState>,
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, data: &[u8]) -> Result<(), anyhow::Error> {
            if self.state.fail_sends.load(Ordering::SeqCst) {
                return Err(anyhow::anyhow!("mock transport send failure"));
            }
            self.state
                .sent
                .lock()
                .expect("mock lock poisoned")
                .push(data.to_vec());
            Ok(())
        }

        async fn disconnect(&self) {
            let tx = self
                .state
                .event_tx
                .lock()
                .expect("mock lock poisoned")
                .clone();
            if let Some(tx) = tx {
                let _ = tx.send(TransportEvent::Disconnected).await;
            }
        }
    }

    /// Factory handing out transports that all share one scripted state.
    /// Reusable across reconnects, like the real factory.
    #[derive(Default)]
    pub struct MockTransportFactory {
        state: Arc<MockState>,
    }

    impl MockTransportFactory {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn handle(&self) -> MockTransportHandle {
            MockTransportHandle {
                state: self.state.clone(),
            }
        }
    }

    #[async_trait]
    impl TransportFactory for MockTransportFactory {
        async fn create_transport(
            &self,
        ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>), anyhow::Error> {
            let (event_tx, event_rx) = mpsc::channel(100);
            *self.state.event_tx.lock().expect("mock lock poisoned") = Some(event_tx.clone());
            let _ = event_tx.send(TransportEvent::Connected).await;
            Ok((
                Arc::new(MockTransport {
                    state: self.state.clone(),
                }),
                event_rx,
            ))
        }
    }

    /// Test-side control surface for a [`MockTransportFactory`].
    #[derive(Clone)]
    pub struct MockTransportHandle {
        state: Arc<MockState>,
    }

    impl MockTransportHandle {
        /// Injects a raw transport event into the client's read loop.
        pub async fn inject(&self, event: TransportEvent) -> bool {
            let tx = self
                .state
                .event_tx
                .lock()
                .expect("mock lock poisoned")
                .clone();
            match tx {
                Some(tx) => tx.send(event).await.is_ok(),
                None => false,
            }
        }

        /// Injects a server event frame.
        pub async fn push_server_event(&self, event: &str, data: serde_json::Value) -> bool {
            let frame = serde_json::json!({ "event": event, "data": data });
            self.inject(TransportEvent::DataReceived(Bytes::from(
                serde_json::to_vec(&frame).expect("frame encodes"),
            )))
            .await
        }

        /// Injects a successful ack for the given ack id.
        pub async fn push_ack(&self, ack_id: &str, data: serde_json::Value) -> bool {
            let frame = serde_json::json!({ "event": "ack", "ack": ack_id, "data": data });
            self.inject(TransportEvent::DataReceived(Bytes::from(
                serde_json::to_vec(&frame).expect("frame encodes"),
            )))
            .await
        }

        /// Injects a rejected ack for the given ack id.
        pub async fn push_ack_error(&self, ack_id: &str, message: &str) -> bool {
            let frame = serde_json::json!({ "event": "ack", "ack": ack_id, "error": message });
            self.inject(TransportEvent::DataReceived(Bytes::from(
                serde_json::to_vec(&frame).expect("frame encodes"),
            )))
            .await
        }

        /// Simulates an unexpected connection drop.
        pub async fn drop_connection(&self) -> bool {
            self.inject(TransportEvent::Disconnected).await
        }

        /// Makes subsequent sends fail at the transport level.
        pub fn set_fail_sends(&self, fail: bool) {
            self.state.fail_sends.store(fail, Ordering::SeqCst);
        }

        /// Every frame the client has sent, decoded.
        pub fn sent_frames(&self) -> Vec<ClientFrame> {
            self.state
                .sent
                .lock()
                .expect("mock lock poisoned")
                .iter()
                .filter_map(|bytes| serde_json::from_slice(bytes).ok())
                .collect()
        }

        /// Frames sent for one event name, in order.
        pub fn sent_for_event(&self, event: &str) -> Vec<ClientFrame> {
            self.sent_frames()
                .into_iter()
                .filter(|f| f.event == event)
                .collect()
        }

        /// Ack id of the most recent frame that requested one. Used by tests
        /// to answer an in-flight emit.
        pub fn last_ack_id(&self) -> Option<String> {
            self.sent_frames().into_iter().rev().find_map(|f| f.ack)
        }

        pub fn clear_sent(&self) {
            self.state.sent.lock().expect("mock lock poisoned").clear();
        }
    }
}
