//! # meshdash
//!
//! Web dashboard for a mesh chat node.
//!
//! This binary provides:
//! - **Engine thread** owning the mesh engine, fed through a command queue
//! - **REST API** (axum) for status, peers, channels, history and commands
//! - **Websocket push** of new messages and connection status changes
//! - **Graceful shutdown** on Ctrl+C / SIGTERM

mod api;
mod config;
mod error;
mod ws;

use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use meshdash_bridge::{
    bridge, spawn_engine_thread, AppSettings, BridgeConfig, BridgeHandle, Command,
    JsonFileSettings, LoopbackEngine, SettingsStore,
};
use meshdash_shared::constants::APP_NAME;

use crate::api::AppState;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,meshdash_server=debug,meshdash_bridge=debug")
            }),
        )
        .init();

    info!("Starting {} v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration and saved settings
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    let settings = JsonFileSettings::new(config.settings_path.clone());
    let saved = match settings.load().await {
        Ok(saved) => saved,
        Err(e) => {
            warn!(error = %e, "Could not read settings, starting fresh");
            AppSettings::default()
        }
    };
    let nickname = config.initial_nickname(saved.nickname.clone());

    // -----------------------------------------------------------------------
    // 3. Start the engine context
    // -----------------------------------------------------------------------
    // The control half stays alive so the engine's event stream stays open.
    let (engine, events, _control) = LoopbackEngine::new(nickname.clone());
    let (handle, adapter) = bridge(
        engine,
        events,
        settings,
        BridgeConfig {
            tick: config.tick,
            ..Default::default()
        },
    );

    for channel in &saved.joined_channels {
        match Command::join_channel(channel, None) {
            Ok(command) => {
                if let Err(e) = handle.submit(command) {
                    warn!(channel = %channel, error = %e, "Could not rejoin channel");
                }
            }
            Err(e) => warn!(channel = %channel, error = %e, "Ignoring saved channel"),
        }
    }

    let engine_thread = spawn_engine_thread(adapter)?;
    info!(nickname = %nickname, "Engine thread started");

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    let app = api::build_router(AppState {
        bridge: handle.clone(),
    });
    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    info!(addr = %config.http_addr, "Dashboard listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(handle.clone()))
        .await;

    // A server error must still stop the engine
    handle.request_shutdown();
    join_engine(engine_thread, config.shutdown_grace).await;

    if let Err(e) = served {
        error!(error = %e, "HTTP server failed");
        return Err(e.into());
    }
    Ok(())
}

async fn shutdown_signal(bridge: BridgeHandle) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }

    bridge.request_shutdown();
}

/// Wait up to `grace` for the engine thread to exit.
async fn join_engine(thread: JoinHandle<()>, grace: Duration) {
    let deadline = tokio::time::Instant::now() + grace;
    while !thread.is_finished() {
        if tokio::time::Instant::now() >= deadline {
            warn!(grace_secs = grace.as_secs(), "Engine thread did not stop in time");
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    match thread.join() {
        Ok(()) => info!("Engine thread stopped"),
        Err(_) => error!("Engine thread panicked"),
    }
}
