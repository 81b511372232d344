//! Starbridge - authoritative starship bridge simulator server
//!
//! Owns the single source of truth for the simulated universe and drives it
//! in fixed ticks. Crew consoles connect over WebSocket and get role-filtered
//! state; physical control panels speak a line-framed JSON protocol over TCP.

mod app;
mod config;
mod http;
mod net;
mod panels;
mod scripting;
mod sim;
mod stations;
mod tcp;
mod util;
mod ws;

use std::path::{Path, PathBuf};

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::Config;
use crate::util::time::init_server_time;

const DEFAULT_CONFIG_PATH: &str = "./config/config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration; a missing file is replaced with written defaults
    let config_path =
        std::env::var("STARBRIDGE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(Path::new(&config_path))?;

    init_tracing(&config.logging.level);
    init_server_time();

    info!("Starbridge Simulator Server");
    info!(path = %config_path, "Configuration loaded");

    create_directories(&config)?;

    // Wire the components
    let state = AppState::new(config.clone())?;

    load_startup_mission(&state, &config);

    // Background workers observe a shared cancellation signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(app::game_loop(state.clone(), shutdown_rx.clone()));
    tokio::spawn(ws::session::broadcast_loop(state.clone(), shutdown_rx.clone()));

    // Panel transport
    let tcp_addr = config.tcp_addr()?;
    let tcp_listener = TcpListener::bind(tcp_addr).await?;
    info!(addr = %tcp_addr, "Panel TCP server listening");
    tokio::spawn(tcp::run_panel_server(
        tcp_listener,
        state.clone(),
        shutdown_rx.clone(),
    ));

    // HTTP + WebSocket transport
    let http_addr = config.server_addr()?;
    let listener = TcpListener::bind(http_addr).await?;
    info!(addr = %http_addr, "Server listening");
    info!("WebSocket endpoint: ws://{http_addr}/ws");

    let router = http::build_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // HTTP has drained; stop the workers and close panel sessions
    let _ = shutdown_tx.send(true);

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging. RUST_LOG overrides the configured level.
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Directories the server expects to exist before it starts
fn create_directories(config: &Config) -> anyhow::Result<()> {
    let mut dirs = vec![PathBuf::from(&config.missions.scripts_path)];
    if let Some(parent) = Path::new(&config.logging.output_file).parent() {
        dirs.push(parent.to_path_buf());
    }

    for dir in dirs {
        if !dir.as_os_str().is_empty() && dir != Path::new(".") {
            std::fs::create_dir_all(&dir)?;
        }
    }

    Ok(())
}

/// Load the startup mission: env override first, then the configured default
fn load_startup_mission(state: &AppState, config: &Config) {
    let mission = match std::env::var("STARBRIDGE_MISSION") {
        Ok(mission) if !mission.is_empty() => Some(mission),
        _ => {
            if config.missions.auto_load && !config.missions.default_mission.is_empty() {
                Some(config.missions.default_mission.clone())
            } else {
                None
            }
        }
    };

    if let Some(mission) = mission {
        info!(mission = %mission, "Loading startup mission");
        let result = {
            let scripts = state.scripts.lock().unwrap();
            scripts.load_mission_file(&mission)
        };
        if let Err(err) = result {
            // A broken mission script is not fatal; the ship still flies
            warn!(mission = %mission, error = %err, "Failed to load startup mission");
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
