use std::time::Duration;

/// Per-type size caps and accepted kinds for chat media, enforced before any
/// upload network call.
#[derive(Debug, Clone, Copy)]
pub struct MediaLimits {
    pub image_max_bytes: u64,
    pub video_max_bytes: u64,
    pub audio_max_bytes: u64,
}

impl Default for MediaLimits {
    fn default() -> Self {
        Self {
            image_max_bytes: 2 * 1024 * 1024,
            video_max_bytes: 25 * 1024 * 1024,
            audio_max_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Side-effect toggles for background message notifications.
#[derive(Debug, Clone, Copy)]
pub struct NotificationOptions {
    pub sound: bool,
    pub desktop: bool,
}

impl Default for NotificationOptions {
    fn default() -> Self {
        Self {
            sound: true,
            desktop: true,
        }
    }
}

/// Configuration for one authenticated chat session.
///
/// Constructed once per session and passed into [`crate::client::Client`];
/// there is no implicit global state or environment lookup.
#[derive(Debug, Clone)]
pub struct Config {
    /// WebSocket endpoint, without the token query parameter.
    pub ws_url: String,
    /// REST API base, e.g. `https://api.example.com/api/v1`.
    pub api_base_url: String,
    /// Base URL media paths are resolved against.
    pub media_base_url: String,
    /// Opaque session token; sent as a bearer header and socket query param.
    pub auth_token: String,
    /// Messages per history page in an open chat.
    pub chat_page_size: u32,
    /// Conversations per page in the directory.
    pub list_page_size: u32,
    pub media_limits: MediaLimits,
    /// How long an emit-with-ack waits for the server before failing.
    pub ack_timeout: Duration,
    pub notifications: NotificationOptions,
}

impl Config {
    pub fn new(
        ws_url: impl Into<String>,
        api_base_url: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Self {
        let api_base_url = api_base_url.into();
        Self {
            ws_url: ws_url.into(),
            media_base_url: api_base_url.clone(),
            api_base_url,
            auth_token: auth_token.into(),
            chat_page_size: 50,
            list_page_size: 20,
            media_limits: MediaLimits::default(),
            ack_timeout: Duration::from_secs(15),
            notifications: NotificationOptions::default(),
        }
    }

    /// Full socket URL with the session token attached.
    pub fn socket_url(&self) -> String {
        format!(
            "{}?token={}",
            self.ws_url,
            urlencoding::encode(&self.auth_token)
        )
    }
}
