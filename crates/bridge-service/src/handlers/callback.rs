//! Platform callback handlers.
//!
//! The platform calls the same path two ways:
//!
//! - `GET` once, when the callback URL is configured, echoing `echostr` back
//!   proves we hold the shared token
//! - `POST` for every event push, with the event XML as the body
//!
//! Both are signed with the query parameters `timestamp`, `nonce` and
//! `signature`. Verification happens before the body is looked at.

use crate::errors::BridgeError;
use crate::models::CallbackQuery;
use crate::observability::metrics;
use crate::routes::AppState;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use common::secret::ExposeSecret;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Check presence of the signed parameters and verify them.
fn verify_callback(
    state: &AppState,
    query: &CallbackQuery,
    method: &'static str,
) -> Result<(), BridgeError> {
    let (Some(timestamp), Some(nonce), Some(signature)) = (
        query.timestamp.as_deref(),
        query.nonce.as_deref(),
        query.signature.as_deref(),
    ) else {
        return Err(BridgeError::BadRequest(
            "Missing callback signature parameters".to_string(),
        ));
    };

    let result = state.verifier.verify(
        state.config.wechat_token.expose_secret(),
        timestamp,
        nonce,
        signature,
        state.clock.now_unix(),
    );
    metrics::record_callback_verification(method, result.is_ok());
    result
}

/// Handler for GET /callback
///
/// Echoes `echostr` verbatim once the signature checks out.
#[instrument(skip_all, name = "bridge.callback.negotiate")]
pub async fn callback_negotiate(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Result<String, BridgeError> {
    let Some(echostr) = query.echostr.clone() else {
        return Err(BridgeError::BadRequest("Missing echostr".to_string()));
    };

    verify_callback(&state, &query, "GET")?;

    debug!(target: "bridge.handlers.callback", "Callback negotiation accepted");
    Ok(echostr)
}

/// Handler for POST /callback
///
/// Returns 200 with an empty body for every verified push, whatever the
/// event turns out to be.
#[instrument(skip_all, name = "bridge.callback.event")]
pub async fn callback_event(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
    body: Bytes,
) -> Result<StatusCode, BridgeError> {
    verify_callback(&state, &query, "POST")?;

    let body = String::from_utf8_lossy(&body);
    let outcome = state.events.process(&body).await;

    debug!(target: "bridge.handlers.callback", outcome = outcome.as_str(), "Callback event handled");
    Ok(StatusCode::OK)
}
