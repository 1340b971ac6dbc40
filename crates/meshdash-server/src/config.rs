//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the dashboard can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use meshdash_shared::constants::{DEFAULT_HTTP_PORT, DEFAULT_TICK_MS};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:5000`
    pub http_addr: SocketAddr,

    /// Engine polling interval.
    /// Env: `TICK_MS`
    /// Default: `100`
    pub tick: Duration,

    /// Nickname used when no settings file has one.
    /// Env: `NICKNAME`
    /// Default: `anon` followed by four random hex digits.
    pub nickname: Option<String>,

    /// Settings file rewritten on every nickname change.
    /// Env: `SETTINGS_PATH`
    /// Default: `./meshdash-settings.json`
    pub settings_path: PathBuf,

    /// How long shutdown waits for the engine thread.
    /// Env: `SHUTDOWN_GRACE_SECS`
    /// Default: `5`
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            tick: Duration::from_millis(DEFAULT_TICK_MS),
            nickname: None,
            settings_path: PathBuf::from("./meshdash-settings.json"),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(val) = var("TICK_MS") {
            match val.parse::<u64>() {
                Ok(ms) if ms > 0 => config.tick = Duration::from_millis(ms),
                _ => tracing::warn!(value = %val, "Invalid TICK_MS, using default"),
            }
        }

        if let Some(name) = var("NICKNAME") {
            let name = name.trim();
            if !name.is_empty() {
                config.nickname = Some(name.to_string());
            }
        }

        if let Some(path) = var("SETTINGS_PATH") {
            config.settings_path = PathBuf::from(path);
        }

        if let Some(val) = var("SHUTDOWN_GRACE_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                config.shutdown_grace = Duration::from_secs(secs);
            } else {
                tracing::warn!(value = %val, "Invalid SHUTDOWN_GRACE_SECS, using default");
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }

    /// Saved nickname first, then `NICKNAME`, then a random one.
    pub fn initial_nickname(&self, saved: Option<String>) -> String {
        saved
            .filter(|n| !n.trim().is_empty())
            .or_else(|| self.nickname.clone())
            .unwrap_or_else(random_nickname)
    }
}

fn random_nickname() -> String {
    format!("anon{}", hex::encode(rand::random::<[u8; 2]>()))
}
