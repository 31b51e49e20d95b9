//! Observability helpers for the bridge service.
//!
//! # Privacy
//!
//! Open IDs identify real platform users. They are never logged verbatim;
//! log fields carry `hash_for_correlation(open_id)` instead, which is stable
//! enough to follow one user across log lines and short enough to limit
//! reversibility.

pub mod metrics;

use ring::digest::{digest, SHA256};

/// Hash a value for log correlation.
///
/// Returns the first 8 hex characters (32 bits) of its SHA-256 digest.
pub fn hash_for_correlation(value: &str) -> String {
    let result = digest(&SHA256, value.as_bytes());
    hex::encode(result.as_ref().get(..4).unwrap_or_default())
}
