//! # Bridge Test Utilities
//!
//! Shared test utilities for the bridge service.
//!
//! This crate provides:
//! - Server test harness (`TestBridgeServer` for E2E tests)
//! - Callback signing helpers (`signed_params`, `now_unix`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bridge_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestBridgeServer::spawn().await?;
//!     let client = reqwest::Client::new();
//!
//!     let response = client
//!         .get(server.api_url("/callback"))
//!         .query(&signed_params(TEST_TOKEN, now_unix(), "nonce"))
//!         .query(&[("echostr", "hello")])
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod server_harness;
pub mod signing;

// Re-export commonly used items
pub use server_harness::*;
pub use signing::*;
