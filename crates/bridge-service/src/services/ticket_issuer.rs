//! QR ticket issuance.
//!
//! `SceneRegistry` asks a `TicketIssuer` for a ticket when a scene is created.
//! The production issuer goes through the platform API; tests use
//! `mock::MockTicketIssuer`.

use crate::errors::BridgeError;
use crate::models::IssuedTicket;
use crate::services::wechat_client::WechatClient;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Trait for ticket issuance (enables mocking).
#[async_trait::async_trait]
pub trait TicketIssuer: Send + Sync {
    /// Issue a temporary QR ticket bound to `scene_id`.
    async fn issue(&self, scene_id: Uuid, expire_seconds: u32) -> Result<IssuedTicket, BridgeError>;
}

/// Issues tickets through the platform QR-code API.
///
/// The scene id is sent as the QR scene string, so a subscribe through the
/// code comes back with event key `qrscene_<scene_id>`.
#[derive(Debug, Clone)]
pub struct WechatTicketIssuer {
    client: Arc<WechatClient>,
}

impl WechatTicketIssuer {
    pub fn new(client: Arc<WechatClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl TicketIssuer for WechatTicketIssuer {
    #[instrument(skip_all, fields(scene_id = %scene_id))]
    async fn issue(&self, scene_id: Uuid, expire_seconds: u32) -> Result<IssuedTicket, BridgeError> {
        self.client
            .create_qr_ticket(&scene_id.to_string(), expire_seconds)
            .await
    }
}

/// Mock ticket issuer for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Mock issuer that derives tickets from the scene id.
    pub struct MockTicketIssuer {
        call_count: AtomicUsize,
        return_error: bool,
        delay: Option<Duration>,
    }

    impl MockTicketIssuer {
        /// Create a mock that always issues a ticket.
        pub fn succeeding() -> Self {
            Self {
                call_count: AtomicUsize::new(0),
                return_error: false,
                delay: None,
            }
        }

        /// Create a mock that always fails with an upstream error.
        pub fn failing() -> Self {
            Self {
                call_count: AtomicUsize::new(0),
                return_error: true,
                delay: None,
            }
        }

        /// Create a mock that succeeds only after `delay`.
        pub fn slow(delay: Duration) -> Self {
            Self {
                call_count: AtomicUsize::new(0),
                return_error: false,
                delay: Some(delay),
            }
        }

        /// Get the number of calls made.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl TicketIssuer for MockTicketIssuer {
        async fn issue(
            &self,
            scene_id: Uuid,
            _expire_seconds: u32,
        ) -> Result<IssuedTicket, BridgeError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            if self.return_error {
                return Err(BridgeError::Upstream("Mock ticket issuer error".to_string()));
            }

            let ticket = format!("ticket-{scene_id}");
            Ok(IssuedTicket {
                qr_url: format!("https://qr.example.test/show?ticket={ticket}"),
                ticket,
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::mock::MockTicketIssuer;
    use super::*;
    use common::secret::SecretString;
    use common::token_manager::TokenReceiver;
    use std::time::Duration;
    use tokio::sync::watch;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_mock_succeeding() {
        let issuer = MockTicketIssuer::succeeding();
        let scene_id = Uuid::new_v4();

        let issued = issuer.issue(scene_id, 300).await.unwrap();
        assert_eq!(issued.ticket, format!("ticket-{scene_id}"));
        assert_eq!(issuer.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_failing() {
        let issuer = MockTicketIssuer::failing();

        let result = issuer.issue(Uuid::new_v4(), 300).await;
        assert!(matches!(result, Err(BridgeError::Upstream(_))));
        assert_eq!(issuer.call_count(), 1);
    }

    #[tokio::test]
    async fn test_wechat_issuer_sends_scene_id() {
        let server = MockServer::start().await;
        let scene_id = Uuid::new_v4();

        Mock::given(method("POST"))
            .and(path("/cgi-bin/qrcode/create"))
            .and(body_partial_json(serde_json::json!({
                "expire_seconds": 600,
                "action_info": {"scene": {"scene_str": scene_id.to_string()}}
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"ticket": "T"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (_tx, rx) = watch::channel(SecretString::from("ACCESS_TOKEN"));
        let client = WechatClient::new(
            server.uri(),
            TokenReceiver::from_test_channel(rx),
            Duration::from_secs(5),
        )
        .unwrap();
        let issuer = WechatTicketIssuer::new(Arc::new(client));

        let issued = issuer.issue(scene_id, 600).await.unwrap();
        assert_eq!(issued.ticket, "T");
    }
}
