//! Liveness and fallback handlers.

use crate::models::HealthResponse;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use tracing::instrument;

/// Handler for GET /health
///
/// The bridge keeps no external connections open, so being able to answer
/// is the whole check.
#[instrument(skip_all, name = "bridge.health.check")]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Fallback for unknown paths.
pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"errmsg": "The requested path was not found."})),
    )
}
