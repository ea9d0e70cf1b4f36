use anyhow::{Result, anyhow};
use dashmap::DashMap;
use log::{debug, error, info, warn};
use rand::RngCore;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::{Mutex, Notify, mpsc, oneshot};
use tokio::time::{Duration, sleep};

use crate::config::Config;
use crate::handlers;
use crate::handlers::router::EventRouter;
use crate::transport::{Transport, TransportEvent, TransportFactory};
use crate::types::events::{Connected, Disconnected, EventBus};
use crate::types::presence::PresenceState;
use crate::wire::{ClientFrame, ServerFrame};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("client is not connected")]
    NotConnected,
    #[error("client is already connected")]
    AlreadyConnected,
    #[error("transport error: {0}")]
    Transport(anyhow::Error),
    #[error("frame encode error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// The chat socket client.
///
/// Owns the single persistent connection for one authenticated session:
/// connection lifecycle with transparent reconnection, frame emission with
/// optional server acks, idempotent room membership, and the typed
/// [`EventBus`] everything downstream subscribes to.
pub struct Client {
    pub(crate) config: Config,
    pub(crate) event_bus: Arc<EventBus>,
    pub(crate) router: EventRouter,

    pub(crate) transport: Arc<Mutex<Option<Arc<dyn Transport>>>>,
    pub(crate) transport_events: Arc<Mutex<Option<mpsc::Receiver<TransportEvent>>>>,
    pub(crate) transport_factory: Arc<dyn TransportFactory>,

    pub(crate) is_connected_flag: Arc<AtomicBool>,
    pub(crate) is_connecting: Arc<AtomicBool>,
    pub(crate) is_running: Arc<AtomicBool>,
    pub(crate) expected_disconnect: Arc<AtomicBool>,
    pub(crate) shutdown_notifier: Arc<Notify>,

    /// Waiters for server acks, keyed by the ack id of the emitted frame.
    pub(crate) ack_waiters:
        Arc<Mutex<HashMap<String, oneshot::Sender<Result<serde_json::Value, String>>>>>,
    pub(crate) unique_id: String,
    pub(crate) id_counter: Arc<AtomicU64>,

    /// Rooms this client currently has a server-side membership in.
    /// Guards against duplicate joins and drives re-join after reconnect.
    pub(crate) joined_rooms: Arc<Mutex<HashSet<String>>>,

    /// Process-wide presence overlay, updated by push events only.
    pub(crate) presence: DashMap<String, PresenceState>,

    pub enable_auto_reconnect: Arc<AtomicBool>,
    pub auto_reconnect_errors: Arc<AtomicU32>,
}

impl Client {
    pub fn new(config: Config, transport_factory: Arc<dyn TransportFactory>) -> Arc<Self> {
        let mut unique_id_bytes = [0u8; 2];
        rand::rng().fill_bytes(&mut unique_id_bytes);

        Arc::new(Self {
            config,
            event_bus: Arc::new(EventBus::new()),
            router: Self::default_router(),

            transport: Arc::new(Mutex::new(None)),
            transport_events: Arc::new(Mutex::new(None)),
            transport_factory,

            is_connected_flag: Arc::new(AtomicBool::new(false)),
            is_connecting: Arc::new(AtomicBool::new(false)),
            is_running: Arc::new(AtomicBool::new(false)),
            expected_disconnect: Arc::new(AtomicBool::new(false)),
            shutdown_notifier: Arc::new(Notify::new()),

            ack_waiters: Arc::new(Mutex::new(HashMap::new())),
            unique_id: format!("{}.{}", unique_id_bytes[0], unique_id_bytes[1]),
            id_counter: Arc::new(AtomicU64::new(0)),

            joined_rooms: Arc::new(Mutex::new(HashSet::new())),
            presence: DashMap::new(),

            enable_auto_reconnect: Arc::new(AtomicBool::new(true)),
            auto_reconnect_errors: Arc::new(AtomicU32::new(0)),
        })
    }

    fn default_router() -> EventRouter {
        let mut router = EventRouter::new();

        router.register(Arc::new(handlers::message::MessageHandler));
        router.register(Arc::new(handlers::notification::NotificationHandler));
        router.register(Arc::new(handlers::receipt::ReadReceiptHandler));
        router.register(Arc::new(handlers::receipt::AllReadHandler));
        router.register(Arc::new(handlers::typing::TypingHandler::started()));
        router.register(Arc::new(handlers::typing::TypingHandler::stopped()));
        router.register(Arc::new(handlers::presence::PresenceHandler::online()));
        router.register(Arc::new(handlers::presence::PresenceHandler::offline()));
        router.register(Arc::new(handlers::error::ErrorHandler));

        router
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Single source of truth for gating send controls in the UI.
    pub fn is_connected(&self) -> bool {
        self.is_connected_flag.load(Ordering::Relaxed)
    }

    /// Last pushed presence for a user, if any has been observed.
    pub fn presence_of(&self, user_id: &str) -> Option<PresenceState> {
        self.presence.get(user_id).map(|entry| *entry.value())
    }

    /// Connection supervisor: connects, pumps frames, and reconnects with
    /// backoff until [`Client::disconnect`] is called or auto-reconnect is
    /// disabled.
    pub async fn run(self: &Arc<Self>) {
        if self.is_running.swap(true, Ordering::SeqCst) {
            warn!("Client `run` method called while already running.");
            return;
        }
        while self.is_running.load(Ordering::Relaxed) {
            self.expected_disconnect.store(false, Ordering::Relaxed);

            if self.connect().await.is_err() {
                error!("Failed to connect, will retry...");
            } else {
                if self.read_frames_loop().await.is_err() {
                    warn!("Frame loop exited with an error. Will reconnect if enabled.");
                } else {
                    debug!("Frame loop exited gracefully.");
                }
                self.cleanup_connection_state().await;
            }

            if !self.enable_auto_reconnect.load(Ordering::Relaxed) {
                info!("Auto-reconnect disabled, shutting down.");
                self.is_running.store(false, Ordering::Relaxed);
                break;
            }

            if self.expected_disconnect.load(Ordering::Relaxed) {
                debug!("Expected disconnect, leaving run loop.");
                self.is_running.store(false, Ordering::Relaxed);
                break;
            }

            let error_count = self.auto_reconnect_errors.fetch_add(1, Ordering::SeqCst);
            let delay_secs = u64::from(error_count * 2).min(30);
            let delay = Duration::from_secs(delay_secs);
            info!(
                "Will attempt to reconnect in {:?} (attempt {})",
                delay,
                error_count + 1
            );
            sleep(delay).await;
        }
        info!("Client run loop has shut down.");
    }

    pub async fn connect(self: &Arc<Self>) -> Result<()> {
        if self.is_connecting.swap(true, Ordering::SeqCst) {
            return Err(ClientError::AlreadyConnected.into());
        }

        let _guard = scopeguard::guard((), |_| {
            self.is_connecting.store(false, Ordering::Relaxed);
        });

        if self.is_connected() {
            return Err(ClientError::AlreadyConnected.into());
        }

        let (transport, transport_events) = self.transport_factory.create_transport().await?;

        *self.transport.lock().await = Some(transport);
        *self.transport_events.lock().await = Some(transport_events);
        self.is_connected_flag.store(true, Ordering::Relaxed);
        self.auto_reconnect_errors.store(0, Ordering::Relaxed);

        info!(target: "Client", "Socket connected");
        let _ = self.event_bus.connected.send(Arc::new(Connected));

        // Restore server-side room membership for sessions that stayed open
        // across the reconnect.
        if let Err(e) = self.rejoin_rooms().await {
            warn!(target: "Client", "Failed to re-join rooms after reconnect: {e:?}");
        }

        let client_clone = self.clone();
        tokio::spawn(async move { client_clone.keepalive_loop().await });

        Ok(())
    }

    /// Intentional shutdown. Stops the run loop and closes the transport.
    pub async fn disconnect(&self) {
        info!("Disconnecting client intentionally.");
        self.expected_disconnect.store(true, Ordering::Relaxed);
        self.is_running.store(false, Ordering::Relaxed);
        self.shutdown_notifier.notify_waiters();

        if let Some(transport) = self.transport.lock().await.as_ref() {
            transport.disconnect().await;
        }
        self.cleanup_connection_state().await;
    }

    pub(crate) async fn cleanup_connection_state(&self) {
        self.is_connected_flag.store(false, Ordering::Relaxed);
        *self.transport.lock().await = None;
        *self.transport_events.lock().await = None;
        self.ack_waiters.lock().await.clear();
    }

    async fn read_frames_loop(self: &Arc<Self>) -> Result<()> {
        debug!(target: "Client", "Starting frame processing loop...");

        let mut transport_events = {
            let mut rx_guard = self.transport_events.lock().await;
            rx_guard
                .take()
                .ok_or_else(|| anyhow!("Cannot start frame loop: not connected"))?
        };

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_notifier.notified() => {
                    debug!(target: "Client", "Shutdown signaled, exiting frame loop.");
                    return Ok(());
                },
                event = transport_events.recv() => {
                    match event {
                        Some(TransportEvent::DataReceived(data)) => {
                            // Frames are processed inline and in order:
                            // transcript order must follow server delivery.
                            self.handle_frame(&data).await;
                        }
                        Some(TransportEvent::Disconnected) | None => {
                            self.cleanup_connection_state().await;
                            if !self.expected_disconnect.load(Ordering::Relaxed) {
                                info!("Transport disconnected unexpectedly.");
                                let _ = self.event_bus.disconnected.send(Arc::new(Disconnected));
                                return Err(anyhow!("Transport disconnected unexpectedly"));
                            }
                            info!("Transport disconnected as expected.");
                            return Ok(());
                        }
                        Some(TransportEvent::Connected) => {
                            debug!("Transport connected event received");
                        }
                    }
                }
            }
        }
    }

    async fn handle_frame(self: &Arc<Self>, data: &[u8]) {
        let frame = match ServerFrame::from_bytes(data) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(target: "Client/Recv", "Discarding malformed frame: {e}");
                return;
            }
        };

        if frame.is_ack() {
            if !self.handle_ack_response(&frame).await {
                warn!(target: "Client/Recv", "Ack response with no waiter: {:?}", frame.ack);
            }
            return;
        }

        if !self.router.dispatch(self.clone(), &frame).await {
            debug!(target: "Client/Recv", "No handler for event '{}'", frame.event);
        }
    }

    /// Serializes and sends a frame over the live transport.
    ///
    /// Rejects synchronously with [`ClientError::NotConnected`] while
    /// disconnected; frames are never queued for later delivery.
    pub(crate) async fn send_frame(&self, frame: &ClientFrame) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        let transport = {
            let guard = self.transport.lock().await;
            guard.clone().ok_or(ClientError::NotConnected)?
        };
        let bytes = frame.to_bytes()?;
        transport.send(&bytes).await.map_err(ClientError::Transport)
    }

    /// Fire-and-forget emit of a client event.
    pub async fn emit(
        &self,
        event: &str,
        data: Option<serde_json::Value>,
    ) -> Result<(), ClientError> {
        self.send_frame(&ClientFrame::new(event, data)).await
    }
}
