//! Test server harness for E2E testing
//!
//! Provides `TestRcServer` for spawning real RC server instances in tests and
//! `WsTestClient` for talking to the signaling socket.

use futures::{SinkExt, StreamExt};
use rc_service::adapter::MemoryAdapter;
use rc_service::auth::IdentityResolver;
use rc_service::config::Config;
use rc_service::handlers::HealthState;
use rc_service::network::{select_network, NetworkDeps};
use rc_service::recording::{RecordingBackend, RecordingClient};
use rc_service::rooms::RoomRegistry;
use rc_service::routes::{self, AppState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::mock_recorder::MockRecordingBackend;
use crate::token_builders::TEST_JWT_SECRET;

/// How long `WsTestClient` waits for a frame.
pub const WS_RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Test harness for spawning Room Controller server in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_probe() -> anyhow::Result<()> {
///     let server = TestRcServer::spawn().await?;
///     let response = reqwest::get(format!("{}/probes/liveness", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestRcServer {
    addr: SocketAddr,
    config: Config,
    identity: Arc<IdentityResolver>,
    registry: RoomRegistry,
    _handle: JoinHandle<()>,
}

impl TestRcServer {
    /// Spawn a server with an accepting mock recording backend.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(Arc::new(MockRecordingBackend::accepting()), None).await
    }

    /// Spawn a server with a custom recording backend for the dispatcher and,
    /// optionally, a recording service URL for the join proxy.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    pub async fn spawn_with(
        recorder: Arc<dyn RecordingBackend>,
        record_service_url: Option<&str>,
    ) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            ("RC_JWT_SECRET".to_string(), TEST_JWT_SECRET.to_string()),
            ("RC_BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("RC_RECORD_TIMEOUT_SECONDS".to_string(), "2".to_string()),
            ("RC_DRAIN_SECONDS".to_string(), "0".to_string()),
        ]);
        if let Some(url) = record_service_url {
            vars.insert("RC_RECORD_SERVICE_URL".to_string(), url.to_string());
        }

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let identity = Arc::new(IdentityResolver::new(
            &config.jwt_secret,
            config.jwt_clock_skew,
        ));
        let recording = RecordingClient::new(&config.record_service_url, config.record_timeout)
            .map_err(|e| anyhow::anyhow!("Failed to create recording client: {}", e))?;

        let registry = RoomRegistry::new();
        let network = select_network(
            config.network_mode,
            NetworkDeps {
                registry: registry.clone(),
                recorder,
                adapter: Arc::new(MemoryAdapter::new()),
            },
        )
        .map_err(|e| anyhow::anyhow!("Failed to select network: {}", e))?;

        let health = Arc::new(HealthState::new());
        health.set_ready();

        let state = Arc::new(AppState {
            config: config.clone(),
            identity: Arc::clone(&identity),
            network,
            recording,
            health,
        });

        // Build routes using rc-service's real route builder
        let app = routes::build_routes(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            identity,
            registry,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The room registry shared by the server's dispatchers.
    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    /// Mint a session token the server accepts.
    pub fn mint_token(&self, user_id: &str) -> Result<String, anyhow::Error> {
        self.identity
            .mint_for(user_id)
            .map_err(|e| anyhow::anyhow!("Failed to mint token: {}", e))
    }

    /// Open the signaling socket, optionally with a `jwt` cookie.
    pub async fn connect_ws(
        &self,
        room: &str,
        client_id: &str,
        token: Option<&str>,
    ) -> Result<WsTestClient, anyhow::Error> {
        let url = format!("ws://{}/ws?room={}&userId={}", self.addr, room, client_id);
        let mut request = url.into_client_request()?;
        if let Some(token) = token {
            request
                .headers_mut()
                .insert("cookie", HeaderValue::from_str(&format!("jwt={token}"))?);
        }

        let (stream, _response) = tokio_tungstenite::connect_async(request).await?;
        Ok(WsTestClient { stream })
    }
}

impl Drop for TestRcServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

/// A signaling socket client speaking JSON frames.
pub struct WsTestClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsTestClient {
    /// Send one JSON frame.
    pub async fn send_json(&mut self, value: &serde_json::Value) -> Result<(), anyhow::Error> {
        self.stream.send(Message::text(value.to_string())).await?;
        Ok(())
    }

    /// Receive the next text frame as JSON.
    pub async fn recv_json(&mut self) -> Result<serde_json::Value, anyhow::Error> {
        loop {
            let message = tokio::time::timeout(WS_RECV_TIMEOUT, self.stream.next())
                .await
                .map_err(|_| anyhow::anyhow!("Timed out waiting for frame"))?
                .ok_or_else(|| anyhow::anyhow!("Socket closed"))??;

            if let Message::Text(text) = message {
                return Ok(serde_json::from_str(text.as_str())?);
            }
        }
    }

    /// Receive frames until one of the given type arrives.
    pub async fn recv_event(&mut self, event_type: &str) -> Result<serde_json::Value, anyhow::Error> {
        loop {
            let frame = self.recv_json().await?;
            if frame["type"] == event_type {
                return Ok(frame);
            }
        }
    }

    /// Close the socket.
    pub async fn close(mut self) -> Result<(), anyhow::Error> {
        self.stream.close(None).await?;
        Ok(())
    }
}
