//! HTTP client for the platform's official-account API.
//!
//! Covers the two calls the bridge needs: creating a temporary QR ticket for a
//! scene and sending a template message. Every request carries the current
//! access token from the token manager.
//!
//! # Security
//!
//! - The access token travels only as a query parameter and is never logged
//! - Timeouts prevent hanging connections
//! - Platform error details are logged server-side; callers see `Upstream`

use crate::errors::BridgeError;
use crate::models::IssuedTicket;
use common::secret::ExposeSecret;
use common::token_manager::TokenReceiver;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, instrument, warn};

/// Image endpoint that renders a QR code for a ticket.
pub const QR_IMAGE_BASE_URL: &str = "https://mp.weixin.qq.com/cgi-bin/showqrcode";

/// Action name for temporary QR codes keyed by a string scene.
const QR_ACTION_NAME: &str = "QR_STR_SCENE";

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct QrCreateRequest<'a> {
    expire_seconds: u32,
    action_name: &'static str,
    action_info: QrActionInfo<'a>,
}

#[derive(Debug, Serialize)]
struct QrActionInfo<'a> {
    scene: QrScene<'a>,
}

#[derive(Debug, Serialize)]
struct QrScene<'a> {
    scene_str: &'a str,
}

#[derive(Debug, Deserialize)]
struct QrCreateResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: Option<String>,
    #[serde(default)]
    ticket: Option<String>,
}

/// A template message as the platform expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateMessage {
    pub touser: String,
    pub template_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub data: TemplateData,
}

/// Fields filled into the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateData {
    pub title: TemplateValue,
    pub body: TemplateValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateValue {
    pub value: String,
}

impl TemplateValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlatformStatus {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

/// Platform API client.
#[derive(Clone)]
pub struct WechatClient {
    client: Client,
    base_url: String,
    tokens: TokenReceiver,
}

impl std::fmt::Debug for WechatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WechatClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl WechatClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Platform API root (e.g., "https://api.weixin.qq.com")
    /// * `tokens` - Access token handle from the token manager
    /// * `timeout` - Total request timeout
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Internal` if the HTTP client cannot be built.
    pub fn new(
        base_url: String,
        tokens: TokenReceiver,
        timeout: Duration,
    ) -> Result<Self, BridgeError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(timeout))
            .build()
            .map_err(|e| {
                error!(target: "bridge.services.wechat_client", error = %e, "Failed to build HTTP client");
                BridgeError::Internal
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    /// Create a temporary QR ticket for `scene_str`.
    ///
    /// # Errors
    ///
    /// `BridgeError::Upstream` on network failure, timeout, non-2xx status,
    /// a non-zero `errcode`, or a response without a ticket.
    #[instrument(skip_all, fields(expire_seconds = expire_seconds))]
    pub async fn create_qr_ticket(
        &self,
        scene_str: &str,
        expire_seconds: u32,
    ) -> Result<IssuedTicket, BridgeError> {
        let request = QrCreateRequest {
            expire_seconds,
            action_name: QR_ACTION_NAME,
            action_info: QrActionInfo {
                scene: QrScene { scene_str },
            },
        };

        let response: QrCreateResponse = self.post("/cgi-bin/qrcode/create", &request).await?;
        check_errcode("qrcode/create", response.errcode, response.errmsg.as_deref())?;

        let ticket = response
            .ticket
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                warn!(target: "bridge.services.wechat_client", "QR response carried no ticket");
                BridgeError::Upstream("qrcode/create returned no ticket".to_string())
            })?;

        let qr_url = qr_image_url(&ticket)?;
        Ok(IssuedTicket { ticket, qr_url })
    }

    /// Send a template message.
    ///
    /// # Errors
    ///
    /// `BridgeError::Upstream` on network failure, timeout, non-2xx status or
    /// a non-zero `errcode`.
    #[instrument(skip_all)]
    pub async fn send_template_message(&self, message: &TemplateMessage) -> Result<(), BridgeError> {
        let response: PlatformStatus = self
            .post("/cgi-bin/message/template/send", message)
            .await?;
        check_errcode("message/template/send", response.errcode, response.errmsg.as_deref())
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, BridgeError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let token = self.tokens.token();

        let response = self
            .client
            .post(&url)
            .query(&[("access_token", token.expose_secret())])
            .json(body)
            .send()
            .await
            .map_err(|e| {
                let e = e.without_url();
                if e.is_timeout() {
                    warn!(target: "bridge.services.wechat_client", path = %path, "Platform request timed out");
                    BridgeError::Upstream(format!("{path} timed out"))
                } else {
                    warn!(target: "bridge.services.wechat_client", path = %path, error = %e, "Platform request failed");
                    BridgeError::Upstream(format!("{path} request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(target: "bridge.services.wechat_client", path = %path, status = %status, "Platform returned error status");
            return Err(BridgeError::Upstream(format!("{path} returned {status}")));
        }

        response.json().await.map_err(|e| {
            let e = e.without_url();
            warn!(target: "bridge.services.wechat_client", path = %path, error = %e, "Failed to parse platform response");
            BridgeError::Upstream(format!("{path} returned an unparsable body"))
        })
    }
}

fn check_errcode(operation: &str, errcode: i64, errmsg: Option<&str>) -> Result<(), BridgeError> {
    if errcode == 0 {
        return Ok(());
    }

    let errmsg = errmsg.unwrap_or("");
    warn!(
        target: "bridge.services.wechat_client",
        operation = %operation,
        errcode = errcode,
        errmsg = %errmsg,
        "Platform rejected request"
    );
    Err(BridgeError::Upstream(format!(
        "{operation} errcode={errcode} errmsg={errmsg}"
    )))
}

/// Build the QR image URL for a ticket, percent-encoding the ticket.
pub fn qr_image_url(ticket: &str) -> Result<String, BridgeError> {
    Url::parse_with_params(QR_IMAGE_BASE_URL, &[("ticket", ticket)])
        .map(String::from)
        .map_err(|e| {
            error!(target: "bridge.services.wechat_client", error = %e, "Invalid QR image URL");
            BridgeError::Internal
        })
}
