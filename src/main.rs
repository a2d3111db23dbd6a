//! API Traffic Logger - Main entry point
//!
//! Loads configuration from the environment, then serves the forwarding proxy
//! until interrupted.

use anyhow::{Context, Result};
use api_traffic_logger::{api, core::init_tracing, AppConfig, AppState};
use std::net::SocketAddr;
use std::sync::Arc;

fn main() -> Result<()> {
    // Load .env file if present (before reading any environment variables)
    dotenvy::dotenv().ok();

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if let Some(threads) = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|n| *n > 0)
    {
        builder.worker_threads(threads);
    }
    let runtime = builder.enable_all().build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    init_tracing();

    let config = AppConfig::from_env()?;
    let state = Arc::new(AppState::from_config(config)?);

    // The writer creates the directory again on demand; this only surfaces
    // permission problems at startup.
    if let Err(e) = state.logger.ensure_dir().await {
        tracing::warn!(
            dir = %state.logger.project_dir().display(),
            error = %e,
            "Could not create log directory"
        );
    }

    let addr: SocketAddr = format!("{}:{}", state.config.server.host, state.config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                state.config.server.host, state.config.server.port
            )
        })?;

    tracing::info!("API Logger Proxy starting");
    tracing::info!("  Project: {}", state.config.project);
    tracing::info!("  Log directory: {}", state.logger.project_dir().display());
    tracing::info!("  Proxying to: {}", state.config.upstream_url);
    tracing::info!("  Listening on: http://{}", addr);

    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shut down cleanly");
    Ok(())
}

/// Resolve on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, shutting down");
        }
        _ = terminate => {
            tracing::info!("SIGTERM received, shutting down");
        }
    }
}
