mod api;
mod config;
mod gate;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use anyhow::{Context, Result};
use crate::api::routes::{AppState, LocalAddr};
use crate::config::Config;
use crate::gate::GateFile;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gatekeeper=info"))
        )
        .init();

    // Optional TOML config as the only argument
    let config_path = std::env::args().nth(1);
    let config = Config::load_or_default(config_path.as_deref())
        .context("Failed to load gatekeeper config")?;

    // Checked once; the pages served depend on it for the life of the process
    let gate = GateFile::read(&config.gate.config_path);
    tracing::info!(
        "Configuration file {} status: {:?}",
        gate.path().display(),
        gate.status()
    );
    if gate.status().is_blocked() {
        tracing::warn!("No access to {}, serving the permission page", gate.path().display());
    } else if gate.status().needs_setup() {
        tracing::info!("Gatekeeper is not configured yet, serving the welcome page");
    } else if let Some(address) = gate.address() {
        tracing::info!("Client network address: {}", address);
    }

    let cancel = CancellationToken::new();

    let app_state = AppState {
        gate: Arc::new(gate),
        shutdown: cancel.clone(),
    };
    let app = api::routes::router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.listen))?;

    tracing::info!("Serving on http://{}", listener.local_addr()?);

    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<LocalAddr>(),
        )
        .with_graceful_shutdown(async move { server_cancel.cancelled().await })
        .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutdown signal received");
    cancel.cancel();

    let _ = server_handle.await;

    tracing::info!("Server stopped");
    Ok(())
}
