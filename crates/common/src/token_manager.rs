//! Platform access-token manager.
//!
//! Every platform API call carries a short-lived `access_token` obtained from
//! `GET /cgi-bin/token` with the app ID and app secret. The platform allows a
//! limited number of token requests per day and invalidates the previous
//! token when a new one is issued, so exactly one task per process owns it:
//!
//! ```text
//! spawn_token_manager ──► refresh task ──watch──► TokenReceiver (cloned freely)
//!                           │    ▲
//!                           ▼    │ sleep until (expires_at - threshold - margin)
//!                        TokenFetcher
//! ```
//!
//! A failed fetch is retried with a doubling delay capped at 30 seconds. The
//! task never gives up on its own; the caller bounds startup with a timeout.
//!
//! # Example
//!
//! ```rust,ignore
//! use common::secret::{ExposeSecret, SecretString};
//! use common::token_manager::{spawn_token_manager, TokenManagerConfig};
//!
//! let config = TokenManagerConfig::new(
//!     "https://api.weixin.qq.com".to_string(),
//!     "wx0123456789abcdef".to_string(),
//!     SecretString::from("app-secret"),
//! );
//!
//! // Returns once the first token is in hand
//! let (refresh_task, tokens) = spawn_token_manager(config).await?;
//! let access_token = tokens.token();
//! # let _ = access_token.expose_secret();
//!
//! refresh_task.abort();
//! ```

use crate::secret::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Refresh this long before the platform-reported expiry.
pub const DEFAULT_REFRESH_THRESHOLD: Duration = Duration::from_secs(300);

/// Per-request timeout for the token endpoint.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Extra slack on top of the threshold for clock skew and request latency.
const EXPIRY_MARGIN_SECS: i64 = 30;

const TOKEN_PATH: &str = "/cgi-bin/token";

const LOG_TARGET: &str = "common.token_manager";

/// Token manager errors.
#[derive(Error, Debug, Clone)]
pub enum TokenError {
    /// Network failure, timeout, or a non-2xx status.
    #[error("Token endpoint unreachable: {0}")]
    Transport(String),

    /// The platform answered with a non-zero `errcode`.
    #[error("Platform rejected credentials: errcode={errcode}, errmsg={errmsg}")]
    Rejected { errcode: i64, errmsg: String },

    #[error("Malformed token response: {0}")]
    InvalidResponse(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    ClientSetup(String),

    /// The refresh task ended before publishing a token.
    #[error("Token channel closed")]
    ChannelClosed,
}

/// Where and how to fetch tokens.
#[derive(Clone)]
pub struct TokenManagerConfig {
    /// Platform API base URL, e.g. `https://api.weixin.qq.com`.
    pub api_base_url: String,
    pub app_id: String,
    pub app_secret: SecretString,
    pub refresh_threshold: Duration,
    pub http_timeout: Duration,
}

impl std::fmt::Debug for TokenManagerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManagerConfig")
            .field("api_base_url", &self.api_base_url)
            .field("app_id", &self.app_id)
            .field("app_secret", &"[REDACTED]")
            .field("refresh_threshold", &self.refresh_threshold)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl TokenManagerConfig {
    #[must_use]
    pub fn new(api_base_url: String, app_id: String, app_secret: SecretString) -> Self {
        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            app_id,
            app_secret,
            refresh_threshold: DEFAULT_REFRESH_THRESHOLD,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_refresh_threshold(mut self, threshold: Duration) -> Self {
        self.refresh_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }
}

/// Cloneable read handle on the current access token.
#[derive(Clone)]
pub struct TokenReceiver(watch::Receiver<SecretString>);

impl TokenReceiver {
    /// The current token, cloned out so no channel borrow outlives the call.
    #[must_use]
    pub fn token(&self) -> SecretString {
        self.0.borrow().clone()
    }

    /// Wait for the next refresh.
    ///
    /// # Errors
    ///
    /// `TokenError::ChannelClosed` once the refresh task has stopped.
    pub async fn changed(&mut self) -> Result<(), TokenError> {
        self.0
            .changed()
            .await
            .map_err(|_| TokenError::ChannelClosed)
    }

    /// Wrap a bare channel, skipping the first-token guarantee.
    #[cfg(any(test, feature = "test-utils"))]
    #[must_use]
    pub fn from_test_channel(rx: watch::Receiver<SecretString>) -> Self {
        Self(rx)
    }
}

impl std::fmt::Debug for TokenReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenReceiver([REDACTED])")
    }
}

/// A token and the Unix time it stops being valid.
struct IssuedToken {
    value: SecretString,
    expires_at: i64,
}

/// Body of `GET /cgi-bin/token`. The platform answers 200 on failure too,
/// with a non-zero `errcode` and no token.
#[derive(Deserialize)]
struct TokenEndpointBody {
    #[serde(default)]
    access_token: Option<SecretString>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    errcode: Option<i64>,
    #[serde(default)]
    errmsg: Option<String>,
}

impl TokenEndpointBody {
    fn into_token(self, now: i64) -> Result<IssuedToken, TokenError> {
        if let Some(errcode) = self.errcode.filter(|code| *code != 0) {
            return Err(TokenError::Rejected {
                errcode,
                errmsg: self.errmsg.unwrap_or_default(),
            });
        }

        let value = self
            .access_token
            .filter(|t| !t.expose_secret().is_empty())
            .ok_or_else(|| TokenError::InvalidResponse("access_token absent".into()))?;
        let expires_in = self
            .expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .ok_or_else(|| TokenError::InvalidResponse("expires_in absent".into()))?;

        Ok(IssuedToken {
            value,
            expires_at: now.saturating_add(expires_in),
        })
    }
}

/// Calls the token endpoint.
struct TokenFetcher {
    http: reqwest::Client,
    url: String,
    app_id: String,
    app_secret: SecretString,
}

impl TokenFetcher {
    fn new(config: &TokenManagerConfig) -> Result<Self, TokenError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(config.http_timeout))
            .build()
            .map_err(|e| TokenError::ClientSetup(e.to_string()))?;

        Ok(Self {
            http,
            url: format!("{}{}", config.api_base_url, TOKEN_PATH),
            app_id: config.app_id.clone(),
            app_secret: config.app_secret.clone(),
        })
    }

    #[instrument(skip_all, fields(app_id = %self.app_id))]
    async fn fetch(&self) -> Result<IssuedToken, TokenError> {
        let response = self
            .http
            .get(&self.url)
            .query(&[
                ("grant_type", "client_credential"),
                ("appid", self.app_id.as_str()),
                ("secret", self.app_secret.expose_secret()),
            ])
            .send()
            .await
            // The URL carries the secret
            .map_err(|e| TokenError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TokenError::Transport(format!("status {status}")));
        }

        let body: TokenEndpointBody = response
            .json()
            .await
            .map_err(|e| TokenError::InvalidResponse(e.without_url().to_string()))?;

        body.into_token(chrono::Utc::now().timestamp())
    }
}

/// Doubling retry delay, 1s up to 30s.
#[derive(Debug)]
struct Backoff {
    current: Duration,
}

impl Backoff {
    const FIRST: Duration = Duration::from_secs(1);
    const CAP: Duration = Duration::from_secs(30);

    fn new() -> Self {
        Self {
            current: Self::FIRST,
        }
    }

    /// The delay to wait now; the one after is twice as long.
    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(Self::CAP);
        delay
    }

    fn reset(&mut self) {
        self.current = Self::FIRST;
    }
}

/// How long to sleep before refreshing a token that expires at `expires_at`.
/// Never less than one second.
fn refresh_delay(expires_at: i64, now: i64, threshold: Duration) -> Duration {
    let threshold = i64::try_from(threshold.as_secs()).unwrap_or(i64::MAX);
    let refresh_at = expires_at
        .saturating_sub(threshold)
        .saturating_sub(EXPIRY_MARGIN_SECS);
    let secs = refresh_at.saturating_sub(now).max(1);
    Duration::from_secs(secs.unsigned_abs())
}

/// Start the refresh task and wait for its first token.
///
/// The task stops when every `TokenReceiver` is gone or the handle is
/// aborted.
///
/// # Errors
///
/// - `TokenError::ClientSetup` if the HTTP client cannot be built
/// - `TokenError::ChannelClosed` if the task ends before the first token
#[instrument(skip_all, fields(app_id = %config.app_id))]
pub async fn spawn_token_manager(
    config: TokenManagerConfig,
) -> Result<(JoinHandle<()>, TokenReceiver), TokenError> {
    let fetcher = TokenFetcher::new(&config)?;
    let (publisher, mut first) = watch::channel(SecretString::from(""));

    let handle = tokio::spawn(run_refresh(fetcher, config.refresh_threshold, publisher));

    first
        .changed()
        .await
        .map_err(|_| TokenError::ChannelClosed)?;

    Ok((handle, TokenReceiver(first)))
}

async fn run_refresh(
    fetcher: TokenFetcher,
    threshold: Duration,
    publisher: watch::Sender<SecretString>,
) {
    let mut backoff = Backoff::new();
    let mut refreshes: u64 = 0;

    loop {
        let issued = match fetcher.fetch().await {
            Ok(issued) => issued,
            Err(e) => {
                let delay = backoff.next_delay();
                warn!(
                    target: LOG_TARGET,
                    app_id = %fetcher.app_id,
                    error = %e,
                    retry_in_secs = delay.as_secs(),
                    "Access token fetch failed"
                );
                tokio::time::sleep(delay).await;
                continue;
            }
        };
        backoff.reset();

        if publisher.send(issued.value).is_err() {
            debug!(target: LOG_TARGET, app_id = %fetcher.app_id, "No receivers left, refresh task exiting");
            return;
        }

        if refreshes == 0 {
            info!(target: LOG_TARGET, app_id = %fetcher.app_id, expires_at = issued.expires_at, "Access token acquired");
        } else {
            debug!(target: LOG_TARGET, app_id = %fetcher.app_id, refreshes, "Access token refreshed");
        }
        refreshes += 1;

        let delay = refresh_delay(issued.expires_at, chrono::Utc::now().timestamp(), threshold);
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(base_url: &str) -> TokenManagerConfig {
        TokenManagerConfig::new(
            base_url.to_string(),
            "wx-test-app".to_string(),
            SecretString::from("test-secret"),
        )
    }

    fn endpoint_body(json: serde_json::Value) -> TokenEndpointBody {
        serde_json::from_value(json).unwrap()
    }

    fn token_json(token: &str) -> serde_json::Value {
        serde_json::json!({"access_token": token, "expires_in": 7200})
    }

    #[test]
    fn test_config_trims_trailing_slash_and_redacts() {
        let config = TokenManagerConfig::new(
            "https://api.weixin.qq.com/".to_string(),
            "wx-test-app".to_string(),
            SecretString::from("super-secret-value"),
        )
        .with_refresh_threshold(Duration::from_secs(60))
        .with_http_timeout(Duration::from_secs(3));

        assert_eq!(config.api_base_url, "https://api.weixin.qq.com");
        assert_eq!(config.refresh_threshold, Duration::from_secs(60));
        assert_eq!(config.http_timeout, Duration::from_secs(3));

        let debug_str = format!("{config:?}");
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("super-secret-value"));
    }

    #[test]
    fn test_endpoint_body_success() {
        let issued = endpoint_body(token_json("ACCESS")).into_token(1_000).unwrap();

        assert_eq!(issued.value.expose_secret(), "ACCESS");
        assert_eq!(issued.expires_at, 8_200);
    }

    #[test]
    fn test_endpoint_body_errcode() {
        let zero = endpoint_body(serde_json::json!({
            "access_token": "ACCESS",
            "expires_in": 7200,
            "errcode": 0,
            "errmsg": "ok"
        }));
        assert!(zero.into_token(0).is_ok());

        let rejected = endpoint_body(serde_json::json!({"errcode": 40013, "errmsg": "invalid appid"}));
        assert!(matches!(
            rejected.into_token(0),
            Err(TokenError::Rejected { errcode: 40013, ref errmsg }) if errmsg == "invalid appid"
        ));
    }

    #[test]
    fn test_endpoint_body_missing_fields() {
        for json in [
            serde_json::json!({"expires_in": 7200}),
            serde_json::json!({"access_token": "", "expires_in": 7200}),
            serde_json::json!({"access_token": "ACCESS"}),
        ] {
            assert!(matches!(
                endpoint_body(json).into_token(0),
                Err(TokenError::InvalidResponse(_))
            ));
        }
    }

    #[test]
    fn test_backoff_doubles_to_cap_and_resets() {
        let mut backoff = Backoff::new();
        let delays: Vec<u64> = (0..7).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, [1_u64, 2, 4, 8, 16, 30, 30]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_refresh_delay() {
        let threshold = Duration::from_secs(300);

        // 7200s token: wake 330s early
        assert_eq!(refresh_delay(7_200, 0, threshold), Duration::from_secs(6_870));
        // Already inside the refresh window
        assert_eq!(refresh_delay(100, 0, threshold), Duration::from_secs(1));
        assert_eq!(refresh_delay(0, 10_000, threshold), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_receiver_debug_and_updates() {
        let (tx, rx) = watch::channel(SecretString::from("first-token"));
        let mut receiver = TokenReceiver::from_test_channel(rx);
        assert!(!format!("{receiver:?}").contains("first-token"));

        tx.send(SecretString::from("second-token")).unwrap();
        receiver.changed().await.unwrap();
        assert_eq!(receiver.token().expose_secret(), "second-token");

        drop(tx);
        assert!(matches!(receiver.changed().await, Err(TokenError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_spawn_acquires_with_client_credentials() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/cgi-bin/token"))
            .and(query_param("grant_type", "client_credential"))
            .and(query_param("appid", "wx-test-app"))
            .and(query_param("secret", "test-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_json("acquired-token")))
            .expect(1..)
            .mount(&mock_server)
            .await;

        let (handle, receiver) = spawn_token_manager(config_for(&mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(receiver.token().expose_secret(), "acquired-token");
        handle.abort();
    }

    #[tokio::test]
    async fn test_spawn_retries_after_rejection() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/cgi-bin/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "errcode": -1,
                "errmsg": "system error"
            })))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cgi-bin/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_json("after-retry")))
            .mount(&mock_server)
            .await;

        let (handle, receiver) = spawn_token_manager(config_for(&mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(receiver.token().expose_secret(), "after-retry");
        handle.abort();
    }

    #[tokio::test]
    async fn test_spawn_retries_after_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/cgi-bin/token"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cgi-bin/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_json("recovered")))
            .mount(&mock_server)
            .await;

        let (handle, receiver) = spawn_token_manager(config_for(&mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(receiver.token().expose_secret(), "recovered");
        handle.abort();
    }
}
