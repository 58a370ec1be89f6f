//! Application configuration (TOML-based)
//!
//! Loaded from `~/.config/gridlink-ocpp/config.toml` (overridable with the
//! `GRIDLINK_CONFIG` environment variable). `WS_PORT` and `API_PORT`
//! environment variables override the listener ports for containerised
//! deployments.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// WebSocket listener for charge points
    pub ws_host: String,
    pub ws_port: u16,
    /// REST API listener for operators
    pub api_host: String,
    pub api_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_host: "0.0.0.0".to_string(),
            ws_port: 9000,
            api_host: "0.0.0.0".to_string(),
            api_port: 8080,
            shutdown_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OcppConfig {
    /// Heartbeat interval handed to stations at boot (seconds)
    pub heartbeat_interval: u32,
    /// Default timeout for outbound CALLs (seconds)
    pub call_timeout_secs: u64,
    /// Liveness sweeper period (seconds)
    pub sweep_interval_secs: u64,
}

impl Default for OcppConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: 300,
            call_timeout_secs: 30,
            sweep_interval_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub ocpp: OcppConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load from a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let mut config: AppConfig = toml::from_str(&text)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(port) = env_port("WS_PORT") {
            self.server.ws_port = port;
        }
        if let Some(port) = env_port("API_PORT") {
            self.server.api_port = port;
        }
    }

    pub fn ws_addr(&self) -> String {
        format!("{}:{}", self.server.ws_host, self.server.ws_port)
    }

    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.server.api_host, self.server.api_port)
    }
}

fn env_port(name: &str) -> Option<u16> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Default config path: `~/.config/gridlink-ocpp/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gridlink-ocpp")
        .join("config.toml")
}
