use crate::client::Client;
use crate::request::AckError;
use crate::wire::c2s;
use log::{debug, info, warn};
use rand::Rng;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

const KEEP_ALIVE_INTERVAL_MIN: Duration = Duration::from_secs(20);
const KEEP_ALIVE_INTERVAL_MAX: Duration = Duration::from_secs(30);
const KEEP_ALIVE_MAX_FAIL_TIME: Duration = Duration::from_secs(180);
const KEEP_ALIVE_RESPONSE_DEADLINE: Duration = Duration::from_secs(20);

impl Client {
    /// Sends a single keepalive ping and waits for the ack.
    /// Returns true on success, false on failure.
    async fn send_keepalive(&self) -> bool {
        if !self.is_connected() {
            return false;
        }

        debug!(target: "Client/Keepalive", "Sending keepalive ping");
        match self
            .emit_with_ack(c2s::PING, None, Some(KEEP_ALIVE_RESPONSE_DEADLINE))
            .await
        {
            Ok(_) => {
                debug!(target: "Client/Keepalive", "Received keepalive pong");
                true
            }
            Err(e) => {
                warn!(target: "Client/Keepalive", "Keepalive ping failed: {e:?}");
                // A server-side rejection still proves the link is alive.
                matches!(e, AckError::Server(_))
            }
        }
    }

    /// The main keepalive loop. Spawned as a background task per connection.
    pub(crate) async fn keepalive_loop(self: Arc<Self>) {
        let mut last_success = chrono::Utc::now();
        let mut error_count = 0u32;

        loop {
            let interval_ms = rand::rng().random_range(
                KEEP_ALIVE_INTERVAL_MIN.as_millis()..=KEEP_ALIVE_INTERVAL_MAX.as_millis(),
            );
            let interval = Duration::from_millis(interval_ms as u64);

            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if !self.is_connected() {
                        debug!(target: "Client/Keepalive", "Not connected, exiting keepalive loop.");
                        return;
                    }

                    if self.send_keepalive().await {
                        if error_count > 0 {
                            info!(target: "Client/Keepalive", "Keepalive restored.");
                        }
                        error_count = 0;
                        last_success = chrono::Utc::now();
                    } else {
                        error_count += 1;
                        warn!(target: "Client/Keepalive", "Keepalive timeout, error count: {error_count}");

                        // If pings have been failing for too long, drop the
                        // transport so the run loop reconnects.
                        if self.enable_auto_reconnect.load(Ordering::Relaxed)
                            && chrono::Utc::now().signed_duration_since(last_success)
                                > chrono::Duration::from_std(KEEP_ALIVE_MAX_FAIL_TIME).unwrap_or_default()
                        {
                            warn!(
                                target: "Client/Keepalive",
                                "Forcing reconnect after {}s without a pong.",
                                KEEP_ALIVE_MAX_FAIL_TIME.as_secs()
                            );
                            if let Some(transport) = self.transport.lock().await.as_ref() {
                                transport.disconnect().await;
                            }
                            return;
                        }
                    }
                },
                _ = self.shutdown_notifier.notified() => {
                    debug!(target: "Client/Keepalive", "Shutdown signaled, exiting keepalive loop.");
                    return;
                }
            }
        }
    }
}
