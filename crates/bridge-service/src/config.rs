//! Bridge service configuration.
//!
//! Configuration is loaded from environment variables. Secrets are held as
//! `SecretString` and redacted in Debug output.

use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8088";

/// Default prefix for the API routes.
pub const DEFAULT_API_BASE: &str = "/api/v2";

/// Default platform API base URL.
pub const DEFAULT_WECHAT_API_URL: &str = "https://api.weixin.qq.com";

/// Default callback timestamp tolerance in seconds.
pub const DEFAULT_CALLBACK_WINDOW_SECONDS: i64 = 60;

/// Upper bound for the callback timestamp tolerance.
pub const MAX_CALLBACK_WINDOW_SECONDS: i64 = 120;

/// Default lifetime of a temporary QR code in seconds.
pub const DEFAULT_SCENE_EXPIRE_SECONDS: u32 = 300;

/// Platform limits for temporary QR code lifetime.
pub const MIN_SCENE_EXPIRE_SECONDS: u32 = 60;
pub const MAX_SCENE_EXPIRE_SECONDS: u32 = 2_592_000;

/// Default timeout for platform API calls in seconds.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECONDS: u64 = 10;

/// Whole-request timeout applied by the router.
pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Upstream calls must give up before the router does, so a stalled
/// platform surfaces as 502 rather than 408.
pub const MAX_UPSTREAM_TIMEOUT_SECONDS: u64 = REQUEST_TIMEOUT_SECONDS - 1;

/// Bridge service configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8088").
    pub bind_address: String,

    /// Prefix for API routes, without trailing slash (default: "/api/v2").
    /// Empty means the API is served at the root.
    pub api_base: String,

    /// Platform app ID.
    pub wechat_app_id: String,

    /// Platform app secret, used to obtain access tokens.
    pub wechat_app_secret: SecretString,

    /// Shared secret the platform signs callbacks with.
    pub wechat_token: SecretString,

    /// Platform API base URL.
    pub wechat_api_url: String,

    /// Template used for outbound messages.
    pub wechat_template_id: String,

    /// Optional link prefix shown with delivered messages; the message id is
    /// appended.
    pub message_detail_url: Option<String>,

    /// Allowed distance between callback timestamps and local time.
    pub callback_window_seconds: i64,

    /// Lifetime requested for temporary QR codes.
    pub scene_expire_seconds: u32,

    /// Timeout for platform API calls.
    pub upstream_timeout_seconds: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("api_base", &self.api_base)
            .field("wechat_app_id", &self.wechat_app_id)
            .field("wechat_app_secret", &"[REDACTED]")
            .field("wechat_token", &"[REDACTED]")
            .field("wechat_api_url", &self.wechat_api_url)
            .field("wechat_template_id", &self.wechat_template_id)
            .field("message_detail_url", &self.message_detail_url)
            .field("callback_window_seconds", &self.callback_window_seconds)
            .field("scene_expire_seconds", &self.scene_expire_seconds)
            .field("upstream_timeout_seconds", &self.upstream_timeout_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid callback window configuration: {0}")]
    InvalidCallbackWindow(String),

    #[error("Invalid scene expiry configuration: {0}")]
    InvalidSceneExpiry(String),

    #[error("Invalid upstream timeout configuration: {0}")]
    InvalidUpstreamTimeout(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let required = |name: &str| {
            vars.get(name)
                .cloned()
                .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
        };

        let wechat_app_id = required("WECHAT_APP_ID")?;
        let wechat_app_secret = SecretString::from(required("WECHAT_APP_SECRET")?);
        let wechat_token = SecretString::from(required("WECHAT_TOKEN")?);
        let wechat_template_id = required("WECHAT_TEMPLATE_ID")?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let api_base = normalize_api_base(
            vars.get("API_BASE")
                .map(String::as_str)
                .unwrap_or(DEFAULT_API_BASE),
        );

        let wechat_api_url = vars
            .get("WECHAT_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_WECHAT_API_URL.to_string());

        let message_detail_url = vars
            .get("MESSAGE_DETAIL_URL")
            .filter(|url| !url.is_empty())
            .cloned();

        let callback_window_seconds =
            if let Some(value_str) = vars.get("CALLBACK_WINDOW_SECONDS") {
                let value: i64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidCallbackWindow(format!(
                        "CALLBACK_WINDOW_SECONDS must be a valid integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value <= 0 || value > MAX_CALLBACK_WINDOW_SECONDS {
                    return Err(ConfigError::InvalidCallbackWindow(format!(
                        "CALLBACK_WINDOW_SECONDS must be between 1 and {}, got {}",
                        MAX_CALLBACK_WINDOW_SECONDS, value
                    )));
                }

                value
            } else {
                DEFAULT_CALLBACK_WINDOW_SECONDS
            };

        let scene_expire_seconds = if let Some(value_str) = vars.get("SCENE_EXPIRE_SECONDS") {
            let value: u32 = value_str.parse().map_err(|e| {
                ConfigError::InvalidSceneExpiry(format!(
                    "SCENE_EXPIRE_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if !(MIN_SCENE_EXPIRE_SECONDS..=MAX_SCENE_EXPIRE_SECONDS).contains(&value) {
                return Err(ConfigError::InvalidSceneExpiry(format!(
                    "SCENE_EXPIRE_SECONDS must be between {} and {}, got {}",
                    MIN_SCENE_EXPIRE_SECONDS, MAX_SCENE_EXPIRE_SECONDS, value
                )));
            }

            value
        } else {
            DEFAULT_SCENE_EXPIRE_SECONDS
        };

        let upstream_timeout_seconds =
            if let Some(value_str) = vars.get("UPSTREAM_TIMEOUT_SECONDS") {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidUpstreamTimeout(format!(
                        "UPSTREAM_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if !(1..=MAX_UPSTREAM_TIMEOUT_SECONDS).contains(&value) {
                    return Err(ConfigError::InvalidUpstreamTimeout(format!(
                        "UPSTREAM_TIMEOUT_SECONDS must be between 1 and {}, got {}",
                        MAX_UPSTREAM_TIMEOUT_SECONDS, value
                    )));
                }

                value
            } else {
                DEFAULT_UPSTREAM_TIMEOUT_SECONDS
            };

        Ok(Config {
            bind_address,
            api_base,
            wechat_app_id,
            wechat_app_secret,
            wechat_token,
            wechat_api_url,
            wechat_template_id,
            message_detail_url,
            callback_window_seconds,
            scene_expire_seconds,
            upstream_timeout_seconds,
        })
    }
}

/// Trim trailing slashes and ensure a leading one; "/" and "" both mean root.
fn normalize_api_base(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
