//! Configuration management for the conquest server.
//!
//! This module handles loading, validation, and conversion of server configuration
//! from TOML files and command-line arguments.

use conquest_core::Rules;
use conquest_server::{RoomConfig, SecurityConfig, ServerConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use tracing::info;

fn default_max_connections() -> usize { 256 }
fn default_connection_timeout() -> u64 { 30 }
fn default_width() -> i32 { 100 }
fn default_height() -> i32 { 100 }
fn default_tick_interval() -> u64 { 16 }
fn default_broadcast_interval() -> u64 { 50 }
fn default_broadcast_capacity() -> usize { 64 }
fn default_max_message_size() -> usize { 4 * 1024 }
fn default_max_name_length() -> usize { 24 }
fn default_default_name() -> String { "anonymous".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_stats_interval() -> u64 { 60 }

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Network and connection settings
    pub server: ServerSettings,
    /// The hosted room: world size, clocks and game rules
    #[serde(default)]
    pub room: RoomSettings,
    /// Client input limits
    #[serde(default)]
    pub security: SecuritySettings,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Server-specific configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Network address to bind the server to (e.g., "127.0.0.1:8080")
    pub bind_address: String,
    /// Maximum number of concurrent client connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Seconds of client silence before the connection is dropped (0 disables)
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
}

/// Room configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSettings {
    /// World width in cells
    #[serde(default = "default_width")]
    pub width: i32,
    /// World height in cells
    #[serde(default = "default_height")]
    pub height: i32,
    /// Simulation tick interval in milliseconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Snapshot broadcast interval in milliseconds
    #[serde(default = "default_broadcast_interval")]
    pub broadcast_interval_ms: u64,
    /// Frames buffered per client before it starts dropping them
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
    /// Fixed spawn seed, mostly useful for reproducing a session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,
    /// Game rules
    #[serde(default)]
    pub rules: Rules,
}

/// Input limits applied to every client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritySettings {
    /// Maximum accepted frame size in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Display names are truncated to this many characters
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
    /// Name used when a client joins without one
    #[serde(default = "default_default_name")]
    pub default_name: String,
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
    /// Seconds between room statistics reports (0 disables them)
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            tick_interval_ms: default_tick_interval(),
            broadcast_interval_ms: default_broadcast_interval(),
            broadcast_capacity: default_broadcast_capacity(),
            rng_seed: None,
            rules: Rules::default(),
        }
    }
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
            max_name_length: default_max_name_length(),
            default_name: default_default_name(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            stats_interval_secs: default_stats_interval(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                bind_address: "127.0.0.1:8080".to_string(),
                max_connections: default_max_connections(),
                connection_timeout: default_connection_timeout(),
            },
            room: RoomSettings::default(),
            security: SecuritySettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at the specified path
    /// and returns the default configuration.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Converts the application configuration to a game server configuration.
    pub fn to_server_config(&self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        Ok(ServerConfig {
            bind_address: self.server.bind_address.parse()?,
            max_connections: self.server.max_connections,
            connection_timeout: self.server.connection_timeout,
            room: RoomConfig {
                width: self.room.width,
                height: self.room.height,
                tick_interval_ms: self.room.tick_interval_ms,
                broadcast_interval_ms: self.room.broadcast_interval_ms,
                broadcast_capacity: self.room.broadcast_capacity,
                rng_seed: self.room.rng_seed,
                rules: self.room.rules.clone(),
            },
            security: SecurityConfig {
                max_message_size: self.security.max_message_size,
                max_name_length: self.security.max_name_length,
                default_name: self.security.default_name.clone(),
            },
        })
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing the issue.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.bind_address.parse::<SocketAddr>().is_err() {
            return Err(format!("Invalid bind address: {}", &self.server.bind_address));
        }

        if self.server.max_connections == 0 {
            return Err("server.max_connections must be greater than 0".to_string());
        }

        if self.room.width <= 0 || self.room.height <= 0 {
            return Err(format!(
                "World size must be positive, got {}x{}",
                self.room.width, self.room.height
            ));
        }

        if self.room.width < self.room.rules.seed_size || self.room.height < self.room.rules.seed_size {
            return Err(format!(
                "World of {}x{} cells cannot hold a {}x{} seed block",
                self.room.width, self.room.height, self.room.rules.seed_size, self.room.rules.seed_size
            ));
        }

        if self.room.tick_interval_ms == 0 {
            return Err("room.tick_interval_ms must be greater than 0".to_string());
        }

        if self.room.broadcast_interval_ms == 0 {
            return Err("room.broadcast_interval_ms must be greater than 0".to_string());
        }

        if self.room.broadcast_capacity == 0 {
            return Err("room.broadcast_capacity must be greater than 0".to_string());
        }

        self.room.rules.validate().map_err(|e| format!("Invalid room.rules: {e}"))?;

        if self.security.max_message_size == 0 {
            return Err("security.max_message_size must be greater than 0".to_string());
        }

        if self.security.default_name.trim().is_empty() {
            return Err("security.default_name cannot be empty".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}
