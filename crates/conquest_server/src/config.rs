//! Server configuration types and defaults.
//!
//! This module contains the server configuration structure and default values
//! used to initialize and customize the game server behavior.

use conquest_core::{Rules, WorldBounds};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration structure for the game server.
///
/// Contains all necessary parameters to configure server behavior including
/// network settings, the room it hosts and connection limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The socket address to bind the server to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent connections allowed
    pub max_connections: usize,

    /// Seconds a connection may stay silent before it is dropped (0 disables)
    pub connection_timeout: u64,

    /// Settings of the hosted room
    pub room: RoomConfig,

    /// Security configuration settings
    pub security: SecurityConfig,
}

/// Configuration of one room: its world, its clocks and its rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// World width in cells
    pub width: i32,

    /// World height in cells
    pub height: i32,

    /// Simulation tick interval in milliseconds
    pub tick_interval_ms: u64,

    /// Snapshot broadcast interval in milliseconds
    pub broadcast_interval_ms: u64,

    /// Frames buffered per subscriber before a slow client starts dropping them
    pub broadcast_capacity: usize,

    /// Seed for spawn placement; random when absent
    pub rng_seed: Option<u64>,

    /// Game rules of the simulation
    pub rules: Rules,
}

/// Limits applied to client input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Maximum message size in bytes
    pub max_message_size: usize,

    /// Display names are truncated to this many characters
    pub max_name_length: usize,

    /// Name given to clients that join with an empty one
    pub default_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            max_connections: 256,
            connection_timeout: 30,
            room: RoomConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            width: 100,
            height: 100,
            tick_interval_ms: 16, // ~60 simulation ticks per second
            broadcast_interval_ms: 50, // 20 snapshots per second
            broadcast_capacity: 64,
            rng_seed: None,
            rules: Rules::default(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_message_size: 4 * 1024, // 4KB
            max_name_length: 24,
            default_name: "anonymous".to_string(),
        }
    }
}

impl RoomConfig {
    pub fn bounds(&self) -> WorldBounds {
        WorldBounds::new(self.width, self.height)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms.max(1))
    }
}

impl ServerConfig {
    /// Heartbeat timeout, or `None` when disabled.
    pub fn connection_timeout(&self) -> Option<Duration> {
        (self.connection_timeout > 0).then(|| Duration::from_secs(self.connection_timeout))
    }
}
