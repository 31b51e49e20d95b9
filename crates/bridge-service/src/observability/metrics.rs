//! Metrics definitions for the bridge service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `bridge_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: 7 values max
//! - `endpoint`: the route table below, everything else is `/other`
//! - `status`: 3 values (success, error, timeout)
//! - `outcome`: a fixed handful per metric

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return the handle served at `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns an error if a recorder is already installed in this process.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("bridge_http_request_duration_seconds".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.500, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP duration buckets: {e}"))?
        // Platform calls: network round trips bounded by the upstream timeout
        .set_buckets_for_metric(
            Matcher::Suffix("delivery_duration_seconds".to_string()),
            &[0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set delivery duration buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Full("bridge_ticket_issue_duration_seconds".to_string()),
            &[0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set ticket issue buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `bridge_http_requests_total`, `bridge_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
///
/// Captures every response, including extractor rejections and the 404
/// fallback.
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("bridge_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("bridge_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize a request path to a bounded route label.
///
/// The API base prefix is configurable, so routes are matched on their
/// trailing segments and reported without the prefix.
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/health" => return "/health".to_string(),
        "/metrics" => return "/metrics".to_string(),
        _ => {}
    }

    let segments: Vec<&str> = path.trim_end_matches('/').rsplit('/').take(2).collect();
    match segments.as_slice() {
        ["callback", ..] => "/callback".to_string(),
        ["scene", ..] => "/scene".to_string(),
        ["message", ..] => "/message".to_string(),
        [_, "scene"] => "/scene/{scene_id}".to_string(),
        [_, "message"] => "/message/{message_id}".to_string(),
        _ => "/other".to_string(),
    }
}

// ============================================================================
// Callback Metrics
// ============================================================================

/// Record a callback signature check.
///
/// Metric: `bridge_callback_verifications_total`
/// Labels: `method` (GET negotiation or POST event), `outcome` (accepted,
/// rejected)
pub fn record_callback_verification(method: &str, accepted: bool) {
    let outcome = if accepted { "accepted" } else { "rejected" };
    counter!("bridge_callback_verifications_total",
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record what an ingested event did.
///
/// Metric: `bridge_events_total`
/// Labels: `outcome` (bound, already_bound, unknown_scene, ignored, malformed)
pub fn record_event(outcome: &'static str) {
    counter!("bridge_events_total", "outcome" => outcome).increment(1);
}

// ============================================================================
// Scene Metrics
// ============================================================================

/// Record a scene creation attempt.
///
/// Metric: `bridge_scenes_created_total`, `bridge_ticket_issue_duration_seconds`
/// Labels: `status` (success, error)
pub fn record_scene_created(success: bool, duration: Duration) {
    let status = if success { "success" } else { "error" };

    histogram!("bridge_ticket_issue_duration_seconds").record(duration.as_secs_f64());
    counter!("bridge_scenes_created_total", "status" => status).increment(1);
}

/// Record a scene transitioning to bound.
///
/// Metric: `bridge_scenes_bound_total`
pub fn record_scene_bound() {
    counter!("bridge_scenes_bound_total").increment(1);
}

// ============================================================================
// Message Metrics
// ============================================================================

/// Record a message submission.
///
/// Metric: `bridge_messages_submitted_total`
/// Labels: `status` (accepted, rejected)
pub fn record_message_submitted(accepted: bool) {
    let status = if accepted { "accepted" } else { "rejected" };
    counter!("bridge_messages_submitted_total", "status" => status).increment(1);
}

/// Record a delivery attempt's outcome.
///
/// Metric: `bridge_messages_delivered_total`, `bridge_message_delivery_duration_seconds`
/// Labels: `status` (sent, failed)
pub fn record_message_delivery(status: &'static str, duration: Duration) {
    histogram!("bridge_message_delivery_duration_seconds",
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("bridge_messages_delivered_total", "status" => status).increment(1);
}
