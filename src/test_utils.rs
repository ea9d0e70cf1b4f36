//! Shared fixtures for unit and integration tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::client::Client;
use crate::config::Config;
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use crate::rest::ChatApi;
use crate::transport::mock::{MockTransportFactory, MockTransportHandle};

/// HTTP client that replays queued responses and records every request.
#[derive(Default)]
pub struct MockHttpClient {
    responses: Mutex<VecDeque<(u16, Vec<u8>)>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_json(&self, status_code: u16, body: &serde_json::Value) {
        self.responses
            .lock()
            .expect("mock lock poisoned")
            .push_back((status_code, serde_json::to_vec(body).expect("body encodes")));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("mock lock poisoned").clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("mock lock poisoned").len()
    }
}

#[async_trait::async_trait]
impl HttpClient for MockHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, anyhow::Error> {
        self.requests
            .lock()
            .expect("mock lock poisoned")
            .push(request);
        let queued = self
            .responses
            .lock()
            .expect("mock lock poisoned")
            .pop_front();
        match queued {
            Some((status_code, body)) => Ok(HttpResponse { status_code, body }),
            None => Ok(HttpResponse::empty(200)),
        }
    }
}

/// HTTP client where every request fails, for fetch-failure paths.
#[derive(Debug, Clone, Default)]
pub struct FailingMockHttpClient;

#[async_trait::async_trait]
impl HttpClient for FailingMockHttpClient {
    async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, anyhow::Error> {
        Err(anyhow::anyhow!("mock http failure"))
    }
}

pub fn test_config() -> Config {
    Config::new("wss://chat.test/ws", "https://api.test/api/v1", "test-token")
}

/// Enables `RUST_LOG`-driven logging for a test run.
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Builds a client over a scripted mock transport. The client is not
/// connected yet; use [`start_test_client`].
pub fn create_test_client() -> (Arc<Client>, MockTransportHandle) {
    init_test_logging();
    let factory = MockTransportFactory::new();
    let handle = factory.handle();
    let client = Client::new(test_config(), Arc::new(factory));
    (client, handle)
}

pub fn create_test_api(http: Arc<dyn HttpClient>) -> Arc<ChatApi> {
    Arc::new(ChatApi::new(http, &test_config()))
}

/// Spawns the client's run loop and waits for the connection to come up.
pub async fn start_test_client(client: &Arc<Client>) {
    let runner = client.clone();
    tokio::spawn(async move { runner.run().await });
    wait_until_connected(client).await;
}

pub async fn wait_until_connected(client: &Arc<Client>) {
    for _ in 0..200 {
        if client.is_connected() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("client did not connect within the test deadline");
}

pub async fn wait_until_disconnected(client: &Arc<Client>) {
    for _ in 0..200 {
        if !client.is_connected() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("client did not observe the disconnect within the test deadline");
}
