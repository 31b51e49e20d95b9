//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used for every credential the bridge
//! handles: the platform app secret, the callback signing token and the
//! short-lived access token.
//!
//! `SecretString` implements `Debug` with redaction, so a struct deriving
//! `Debug` that holds one is safe to log with `{:?}` or through tracing.
//! The inner value is zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct PlatformCredentials {
//!     app_id: String,
//!     app_secret: SecretString,
//! }
//!
//! let creds = PlatformCredentials {
//!     app_id: "wx0123456789abcdef".to_string(),
//!     app_secret: SecretString::from("app-secret"),
//! };
//!
//! // app_secret is redacted
//! println!("{:?}", creds);
//!
//! // Reading the value is always an explicit call
//! let secret: &str = creds.app_secret.expose_secret();
//! # assert_eq!(secret, "app-secret");
//! ```
//!
//! Use `SecretString` for:
//! - the platform app secret (`WECHAT_APP_SECRET`)
//! - the callback signing token (`WECHAT_TOKEN`)
//! - access tokens returned by the platform

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
