//! HTTP routes for the bridge service.
//!
//! Defines the Axum router and application state.

use crate::config::{Config, REQUEST_TIMEOUT_SECONDS};
use crate::handlers;
use crate::middleware::http_metrics::http_metrics_middleware;
use crate::services::{
    Clock, EventProcessor, MessageSender, MessageTracker, SceneRegistry, SignatureVerifier,
    TicketIssuer,
};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Callback signature verifier.
    pub verifier: SignatureVerifier,

    /// Source of "now" for callback verification.
    pub clock: Arc<dyn Clock>,

    pub scenes: Arc<SceneRegistry>,

    pub events: EventProcessor,

    pub messages: Arc<MessageTracker>,
}

impl AppState {
    /// Wire the services together around the two platform collaborators.
    pub fn new(
        config: Config,
        clock: Arc<dyn Clock>,
        issuer: Arc<dyn TicketIssuer>,
        sender: Arc<dyn MessageSender>,
    ) -> Self {
        let scenes = Arc::new(SceneRegistry::new(
            issuer,
            config.scene_expire_seconds,
            Duration::from_secs(config.upstream_timeout_seconds),
        ));

        Self {
            verifier: SignatureVerifier::new(config.callback_window_seconds),
            clock,
            events: EventProcessor::new(Arc::clone(&scenes)),
            scenes,
            messages: Arc::new(MessageTracker::new(sender)),
            config,
        }
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `{api_base}/callback` - GET negotiation, POST event push (signed)
/// - `{api_base}/scene` - POST create scene
/// - `{api_base}/scene/:scene_id` - GET scene binding
/// - `{api_base}/message` - POST submit message
/// - `{api_base}/message/:message_id` - GET message record
/// - `/health` - Liveness probe, unversioned
/// - `/metrics` - Prometheus metrics endpoint, unversioned
/// - JSON 404 fallback
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - Request timeout (`REQUEST_TIMEOUT_SECONDS`), longer than any upstream call
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let api_base = state.config.api_base.clone();

    let api_routes = Router::new()
        .route(
            "/callback",
            get(handlers::callback_negotiate).post(handlers::callback_event),
        )
        .route("/scene", post(handlers::create_scene))
        .route("/scene/:scene_id", get(handlers::get_scene))
        .route("/message", post(handlers::create_message))
        .route("/message/:message_id", get(handlers::get_message))
        .with_state(state);

    // Unversioned operational endpoints
    let operational_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .merge(
            Router::new()
                .route("/metrics", get(handlers::metrics_handler))
                .with_state(metrics_handle),
        );

    // Nesting at "/" is not allowed; an empty base serves the API at the root
    let routes = if api_base.is_empty() {
        operational_routes.merge(api_routes)
    } else {
        operational_routes.nest(&api_base, api_routes)
    };

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    routes
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECONDS)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
