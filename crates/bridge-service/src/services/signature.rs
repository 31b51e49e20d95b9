//! Callback signature verification.
//!
//! The platform signs every callback with the shared token configured on
//! both sides:
//!
//! ```text
//! signature = hex(sha1(concat(sort([token, timestamp, nonce]))))
//! ```
//!
//! A request is authentic when the digest matches and the timestamp is within
//! the configured window of local time. Both checks run on every request and
//! fail with the same error, so a caller cannot tell which one rejected it.

use crate::errors::BridgeError;
use ring::digest::{digest, SHA1_FOR_LEGACY_USE_ONLY};
use subtle::ConstantTimeEq;
use tracing::debug;

/// Stateless verifier for signed callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureVerifier {
    window_seconds: i64,
}

impl SignatureVerifier {
    /// Create a verifier accepting timestamps within `window_seconds` of now.
    pub fn new(window_seconds: i64) -> Self {
        Self { window_seconds }
    }

    /// Verify a callback signature.
    ///
    /// `now` is the current Unix time in seconds, supplied by the caller.
    ///
    /// # Errors
    ///
    /// `BridgeError::Unauthorized` with the fixed callback message if the
    /// digest does not match, the timestamp is not an integer, or it is
    /// outside the window.
    pub fn verify(
        &self,
        secret: &str,
        timestamp: &str,
        nonce: &str,
        signature: &str,
        now: i64,
    ) -> Result<(), BridgeError> {
        let expected = compute_signature(secret, timestamp, nonce);
        let digest_matches: bool = expected.as_bytes().ct_eq(signature.as_bytes()).into();

        let fresh = timestamp
            .parse::<i64>()
            .map(|ts| now.abs_diff(ts) <= self.window_seconds.unsigned_abs())
            .unwrap_or(false);

        if digest_matches && fresh {
            Ok(())
        } else {
            debug!(
                target: "bridge.signature",
                digest_matches,
                fresh,
                "Callback signature rejected"
            );
            Err(BridgeError::callback_verification_failed())
        }
    }
}

/// Compute the lowercase hex signature for a (secret, timestamp, nonce) triple.
pub fn compute_signature(secret: &str, timestamp: &str, nonce: &str) -> String {
    let mut parts = [secret, timestamp, nonce];
    parts.sort_unstable();
    let joined = parts.concat();

    hex::encode(digest(&SHA1_FOR_LEGACY_USE_ONLY, joined.as_bytes()))
}
