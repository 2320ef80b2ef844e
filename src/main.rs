mod config;
mod error;
mod extract;
mod relay;
mod server;

use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::EnvFilter;

use crate::config::{Config, CONFIG_FILE};
use crate::server::AppState;

async fn shutdown_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Error creating SIGTERM handler: {e}");
            return std::future::pending().await;
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Error creating SIGINT handler: {e}");
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, exiting"),
        _ = sigint.recv() => tracing::info!("Received SIGINT, exiting"),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("vidrelay=info,tower_http=info")),
        )
        .init();

    let config = match Config::get_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error reading {}: {}", CONFIG_FILE, e);
            std::process::exit(1);
        }
    };

    let state = match AppState::new(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error building HTTP clients: {e}");
            std::process::exit(1);
        }
    };

    let addr = config.bind_addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Error binding {addr}: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!(
        generic_backend = ?config.generic_backend,
        "Server listening on {addr}"
    );

    let _ = axum::serve(listener, server::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|why| tracing::error!("Server ended: {why:?}"));
}
