//! Test server harness for E2E testing
//!
//! Provides `TestBridgeServer` for spawning real bridge server instances in
//! tests, with mock platform collaborators.

use bridge_service::config::Config;
use bridge_service::routes::{self, AppState};
use bridge_service::services::message_sender::mock::MockMessageSender;
use bridge_service::services::ticket_issuer::mock::MockTicketIssuer;
use bridge_service::services::{Clock, MessageSender, SystemClock, TicketIssuer};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Callback token the test server is configured with.
pub const TEST_TOKEN: &str = "token";

/// API prefix the test server is configured with.
pub const TEST_API_BASE: &str = "/api/v2";

/// Test harness for spawning the bridge server in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health() -> Result<(), anyhow::Error> {
///     let server = TestBridgeServer::spawn().await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestBridgeServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    _handle: JoinHandle<()>,
}

impl TestBridgeServer {
    /// Spawn a server whose collaborators always succeed, on the wall clock.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(
            Arc::new(MockTicketIssuer::succeeding()),
            Arc::new(MockMessageSender::succeeding()),
            Arc::new(SystemClock),
        )
        .await
    }

    /// Spawn a server with the given collaborators and clock.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Serve the API under `TEST_API_BASE` with callback token `TEST_TOKEN`
    /// - Start the HTTP server in the background
    pub async fn spawn_with(
        issuer: Arc<dyn TicketIssuer>,
        sender: Arc<dyn MessageSender>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, anyhow::Error> {
        let vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("API_BASE".to_string(), TEST_API_BASE.to_string()),
            ("WECHAT_APP_ID".to_string(), "test-app-id".to_string()),
            ("WECHAT_APP_SECRET".to_string(), "test-app-secret".to_string()),
            ("WECHAT_TOKEN".to_string(), TEST_TOKEN.to_string()),
            ("WECHAT_TEMPLATE_ID".to_string(), "test-template".to_string()),
        ]);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let state = Arc::new(AppState::new(config, clock, issuer, sender));

        // Standalone recorder; the global one may already be installed
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        // Build routes using bridge-service's real route builder
        let app = routes::build_routes(Arc::clone(&state), metrics_handle);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        // Spawn server in background
        let handle = tokio::spawn(async move {
            // Use into_make_service_with_connect_info to support SocketAddr extraction
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            state,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the URL of an API route, e.g. `api_url("/scene")`.
    pub fn api_url(&self, path: &str) -> String {
        format!("http://{}{}{}", self.addr, TEST_API_BASE, path)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the application state the server runs on.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }
}

impl Drop for TestBridgeServer {
    fn drop(&mut self) {
        // Abort the HTTP server task so each test cleans up immediately
        self._handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_spawns_successfully() -> Result<(), anyhow::Error> {
        let server = TestBridgeServer::spawn().await?;

        assert!(server.url().starts_with("http://127.0.0.1:"));

        let response = reqwest::get(format!("{}/health", server.url())).await?;
        assert_eq!(response.status(), 200);

        let body: serde_json::Value = response.json().await?;
        assert_eq!(body["status"], "ok");

        Ok(())
    }

    #[tokio::test]
    async fn test_server_provides_addr() -> Result<(), anyhow::Error> {
        let server = TestBridgeServer::spawn().await?;
        let addr = server.addr();

        assert!(addr.ip().is_loopback());
        assert!(addr.port() > 0);
        assert_eq!(server.url(), format!("http://{}", addr));
        assert_eq!(
            server.api_url("/scene"),
            format!("http://{}/api/v2/scene", addr)
        );

        Ok(())
    }
}
