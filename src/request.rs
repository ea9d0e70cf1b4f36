use crate::client::{Client, ClientError};
use crate::wire::ClientFrame;
use log::warn;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::time::timeout;

/// Errors for emits that wait on a server acknowledgment.
#[derive(Debug, Error)]
pub enum AckError {
    #[error("ack timed out")]
    Timeout,
    #[error("client is not connected")]
    NotConnected,
    #[error("send failed: {0}")]
    Send(ClientError),
    #[error("server rejected the request: {0}")]
    Server(String),
    #[error("internal channel closed unexpectedly")]
    InternalChannelClosed,
}

impl Client {
    /// Generates a new unique ack/request id string.
    pub fn generate_request_id(&self) -> String {
        let count = self
            .id_counter
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        format!("{}-{}", self.unique_id, count)
    }

    /// Generates a client correlation id for an optimistic send.
    ///
    /// Derived from the current time plus random bytes so ids stay unique
    /// across reconnects of the same session.
    pub fn generate_temp_id(&self) -> String {
        let mut data = Vec::with_capacity(8 + 16);

        let unix_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        data.extend_from_slice(&unix_time.to_be_bytes());

        let mut random_bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut random_bytes);
        data.extend_from_slice(&random_bytes);

        let hash = Sha256::digest(&data);
        format!("tmp-{}", hex::encode(&hash[..9]))
    }

    /// Emits a client event and asynchronously waits for the server's ack.
    ///
    /// On success, resolves to whatever payload the server attached to the
    /// ack. The waiter is removed on send failure and on timeout so entries
    /// never leak.
    pub async fn emit_with_ack(
        &self,
        event: &str,
        data: Option<serde_json::Value>,
        ack_timeout: Option<Duration>,
    ) -> Result<serde_json::Value, AckError> {
        if !self.is_connected() {
            return Err(AckError::NotConnected);
        }

        let ack_id = self.generate_request_id();
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.ack_waiters.lock().await.insert(ack_id.clone(), tx);

        let frame = ClientFrame::new(event, data).with_ack(ack_id.clone());
        if let Err(e) = self.send_frame(&frame).await {
            self.ack_waiters.lock().await.remove(&ack_id);
            return Err(match e {
                ClientError::NotConnected => AckError::NotConnected,
                other => AckError::Send(other),
            });
        }

        let deadline = ack_timeout.unwrap_or(self.config.ack_timeout);
        match timeout(deadline, rx).await {
            Ok(Ok(Ok(payload))) => Ok(payload),
            Ok(Ok(Err(server_error))) => Err(AckError::Server(server_error)),
            Ok(Err(_)) => Err(AckError::InternalChannelClosed),
            Err(_) => {
                self.ack_waiters.lock().await.remove(&ack_id);
                Err(AckError::Timeout)
            }
        }
    }

    /// Routes an incoming ack frame to the task waiting on it.
    /// Returns `false` if no waiter was registered for the id.
    pub(crate) async fn handle_ack_response(&self, frame: &crate::wire::ServerFrame) -> bool {
        let Some(ack_id) = frame.ack.clone() else {
            warn!(target: "Client/Ack", "Ack frame without an id: {:?}", frame.event);
            return false;
        };

        if let Some(waiter) = self.ack_waiters.lock().await.remove(&ack_id) {
            let result = match &frame.error {
                Some(message) => Err(message.clone()),
                None => Ok(frame.data.clone()),
            };
            if waiter.send(result).is_err() {
                warn!(target: "Client/Ack", "Waiter for ack {ack_id} was dropped before delivery");
            }
            return true;
        }
        false
    }
}
