//! shop-server — storefront order / payment service
//!
//! Long-running service that:
//! - Serves the catalog, cart, order and review REST API (JWT authenticated)
//! - Verifies online payments against the gateway signature
//! - Fans out order notifications (email + WebSocket)

use shop_server::logger::init_logger;
use shop_server::{AppState, Config, api};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const WORKER_DRAIN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    // Keep the guard alive for the file writer
    let _log_guard = init_logger(&config.log_level, config.log_json, config.log_dir.as_deref())?;

    tracing::info!(
        "Starting shop-server v{} (env: {})",
        env!("CARGO_PKG_VERSION"),
        config.environment
    );

    let (state, worker) = AppState::new(&config).await?;
    let worker_handle = tokio::spawn(worker.run());

    let app = api::create_router(state, &config);

    let http_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("shop-server HTTP listening on {http_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Router (and with it the Outbox) is dropped; give the worker time to drain
    match tokio::time::timeout(WORKER_DRAIN_TIMEOUT, worker_handle).await {
        Ok(Err(e)) => tracing::error!("Notification worker panicked: {e}"),
        Err(_) => tracing::warn!("Notification worker did not drain in time"),
        Ok(Ok(())) => {}
    }
    tracing::info!("shop-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
