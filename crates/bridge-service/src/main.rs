//! Platform Bridge
//!
//! Entry point for the bridge service binary.

use bridge_service::config::Config;
use bridge_service::observability::metrics::init_metrics_recorder;
use bridge_service::routes::{self, AppState};
use bridge_service::services::{
    SystemClock, WechatClient, WechatMessageSender, WechatTicketIssuer,
};
use common::token_manager::{spawn_token_manager, TokenManagerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long to wait for the first access token before giving up.
const TOKEN_ACQUISITION_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bridge=debug,common=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Platform Bridge");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        api_base = %config.api_base,
        wechat_api_url = %config.wechat_api_url,
        callback_window_seconds = config.callback_window_seconds,
        scene_expire_seconds = config.scene_expire_seconds,
        "Configuration loaded successfully"
    );

    // Must happen before any metrics are recorded
    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;

    // Access token for platform API calls, kept fresh in the background
    info!(app_id = %config.wechat_app_id, "Spawning access token manager...");
    let upstream_timeout = Duration::from_secs(config.upstream_timeout_seconds);
    let token_config = TokenManagerConfig::new(
        config.wechat_api_url.clone(),
        config.wechat_app_id.clone(),
        config.wechat_app_secret.clone(),
    )
    .with_http_timeout(upstream_timeout);

    let (token_task_handle, token_rx) =
        tokio::time::timeout(TOKEN_ACQUISITION_TIMEOUT, spawn_token_manager(token_config))
            .await
            .map_err(|_| {
                error!(
                    timeout_secs = TOKEN_ACQUISITION_TIMEOUT.as_secs(),
                    "Access token acquisition timed out - platform may be unreachable"
                );
                "Access token acquisition timed out"
            })?
            .map_err(|e| {
                error!(error = %e, "Failed to acquire initial access token");
                e
            })?;

    info!("Access token manager spawned, initial token acquired");

    let client = Arc::new(WechatClient::new(
        config.wechat_api_url.clone(),
        token_rx,
        upstream_timeout,
    )?);
    let issuer = Arc::new(WechatTicketIssuer::new(Arc::clone(&client)));
    let sender = Arc::new(WechatMessageSender::new(
        client,
        config.wechat_template_id.clone(),
        config.message_detail_url.clone(),
    ));

    let bind_address = config.bind_address.clone();
    let state = Arc::new(AppState::new(
        config,
        Arc::new(SystemClock),
        issuer,
        sender,
    ));

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Platform Bridge listening on {}", addr);

    // Start server with graceful shutdown support
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    token_task_handle.abort();
    info!("Platform Bridge shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    let drain_secs: u64 = std::env::var("DRAIN_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (DRAIN_SECONDS=0)");
    }
}
