//! User Cache Gateway - fetch-through cache with backpressure
//!
//! HTTP front end for the cached, rate-limited user lookup service.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use user_cache_gateway::api::create_router;
use user_cache_gateway::{spawn_cleanup_task, spawn_rate_limit_cleanup_task, AppState, Config};

/// Main entry point for the gateway.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build cache, store, task queue, coordinator and limiter
/// 4. Start the cache and rate limit sweeps
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "user_cache_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting User Cache Gateway");

    let config = Config::from_env();
    info!(
        "Configuration loaded: cache_max_entries={}, cache_ttl_ms={}, queue_concurrency={}, queue_delay_ms={}, port={}",
        config.cache_max_entries,
        config.cache_ttl_ms,
        config.queue_concurrency,
        config.queue_delay_ms,
        config.server_port
    );

    let state = AppState::from_config(&config);
    info!("Cache, task queue and rate limiter initialized");

    let sweeps = vec![
        spawn_cleanup_task(state.users.cache(), config.cache_cleanup_interval()),
        spawn_rate_limit_cleanup_task(state.limiter.clone(), config.rate_limit_cleanup_interval()),
    ];
    info!("Background cleanup tasks started");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);
    info!("  GET    /users/:id     - Get user by ID");
    info!("  POST   /users         - Create new user");
    info!("  GET    /cache-status  - Get cache statistics");
    info!("  DELETE /cache         - Clear cache");
    info!("  GET    /health        - Health check");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(sweeps))
    .await
    .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the background sweeps and allows graceful shutdown.
async fn shutdown_signal(sweeps: Vec<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    for sweep in sweeps {
        sweep.abort();
    }
    warn!("Background cleanup tasks aborted");
}
