//! Client connection representation and management.
//!
//! This module defines the structure and behavior of individual client
//! connections, tracking their state and metadata.

use conquest_core::AgentId;
use std::net::SocketAddr;
use std::time::SystemTime;

/// Represents an individual client connection to the server.
///
/// # Fields
///
/// * `agent_id` - The agent controlled by this connection, once it has joined
/// * `remote_addr` - The network address of the connected client
/// * `connected_at` - Timestamp when the connection was established
#[derive(Debug)]
pub struct ClientConnection {
    /// The agent controlled by this connection (None until joined)
    pub agent_id: Option<AgentId>,

    /// The remote network address of the client
    pub remote_addr: SocketAddr,

    /// When this connection was established
    pub connected_at: SystemTime,
}

impl ClientConnection {
    /// Creates a new client connection with the specified remote address.
    ///
    /// The connection starts without an agent and records the current time
    /// as the connection timestamp.
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self {
            agent_id: None,
            remote_addr,
            connected_at: SystemTime::now(),
        }
    }

    pub fn is_joined(&self) -> bool {
        self.agent_id.is_some()
    }
}
