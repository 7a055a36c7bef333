//! dockfence gateway binary.
//!
//! Loads config (file + `DOCKFENCE_*` env), connects to the Docker daemon,
//! and serves the restricted container API until Ctrl-C / SIGTERM.

use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use dockfence_core::error::{FenceError, Result};
use dockfence_gateway::runtime::DockerRuntime;
use dockfence_gateway::{app_state::AppState, config, router};

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

async fn run() -> Result<()> {
    let cfg = config::load()?;
    let listen = cfg.server.listen_addr()?;

    let docker = DockerRuntime::connect(&cfg.runtime)
        .map_err(|e| FenceError::RuntimeUnavailable(e.to_string()))?;
    let state = AppState::new(cfg, Arc::new(docker))?;

    // The process serves even while the daemon is down; requests get 503.
    if !state.runtime().ping().await {
        tracing::warn!("container runtime did not answer the startup ping");
    }

    let app = router::build_router(state.clone());

    tracing::info!(%listen, instance = %state.owner().instance(), "dockfence starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| FenceError::Config(format!("bind {listen} failed: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| FenceError::Unexpected(format!("server failed: {e}")))
}

#[tokio::main]
async fn main() -> ExitCode {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "dockfence exited with error");
            ExitCode::FAILURE
        }
    }
}
