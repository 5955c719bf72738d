//! `argod` — the Argo daemon binary
//!
//! Loads configuration, sweeps stale registry entries from a prior run,
//! binds the HTTP API, and runs until SIGTERM/SIGINT.

use argo::config::ConfigLoader;
use argo::daemon::{create_router, process, DaemonState, ShutdownCoordinator};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ConfigLoader::load()?;
    let now = chrono::Utc::now().timestamp();
    let state = Arc::new(DaemonState::new(config, now));

    match process::startup_sweep(&state).await {
        Ok(0) => {}
        Ok(n) => tracing::warn!(swept = n, "marked stale running workflows as failed on startup"),
        Err(e) => tracing::error!(error = %e, "startup registry sweep failed"),
    }

    let shutdown = ShutdownCoordinator::new();
    shutdown.install();

    let addr = format!("{}:{}", state.config.daemon.bind_addr, state.config.daemon.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "argod listening");

    let router = create_router(state);
    let shutdown_for_serve = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown_for_serve.wait().await })
        .await?;

    tracing::info!("argod shut down");
    Ok(())
}
