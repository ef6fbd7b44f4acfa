//! Connection manager for tracking and managing client connections.
//!
//! This module provides the central registry of all client connections,
//! handling connection admission, agent assignment and removal.

use super::{client::ClientConnection, ConnectionId};
use conquest_core::AgentId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Central registry for all client connections.
///
/// # Architecture
///
/// * Uses `RwLock<HashMap>` for thread-safe connection storage
/// * Implements atomic connection ID generation
/// * Enforces the connection cap at admission time
#[derive(Debug)]
pub struct ConnectionManager {
    /// Map of connection ID to client connection information
    connections: Arc<RwLock<HashMap<ConnectionId, ClientConnection>>>,

    /// Atomic counter for generating unique connection IDs
    next_id: AtomicUsize,

    /// Maximum number of concurrent connections
    max_connections: usize,
}

impl ConnectionManager {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicUsize::new(1),
            max_connections,
        }
    }

    /// Admits a new connection and returns its unique ID.
    ///
    /// # Arguments
    ///
    /// * `remote_addr` - The network address of the connecting client
    ///
    /// # Returns
    ///
    /// A unique `ConnectionId`, or `None` when the server is already at
    /// `max_connections`.
    pub async fn add_connection(&self, remote_addr: SocketAddr) -> Option<ConnectionId> {
        let mut connections = self.connections.write().await;
        if connections.len() >= self.max_connections {
            return None;
        }
        let connection_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        connections.insert(connection_id, ClientConnection::new(remote_addr));
        info!("🔗 Connection {} from {}", connection_id, remote_addr);
        Some(connection_id)
    }

    /// Removes a connection from the manager.
    ///
    /// This should be called when a client disconnects or times out.
    pub async fn remove_connection(&self, connection_id: ConnectionId) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.remove(&connection_id) {
            let duration = connection.connected_at.elapsed().unwrap_or_default();
            info!(
                "❌ Connection {} from {} disconnected after {:.1}s",
                connection_id,
                connection.remote_addr,
                duration.as_secs_f64()
            );
        }
    }

    /// Associates (or clears) the agent controlled by a connection.
    pub async fn set_agent(&self, connection_id: ConnectionId, agent_id: Option<AgentId>) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.get_mut(&connection_id) {
            connection.agent_id = agent_id;
        }
    }

    /// Retrieves the agent associated with a connection.
    pub async fn get_agent(&self, connection_id: ConnectionId) -> Option<AgentId> {
        let connections = self.connections.read().await;
        connections.get(&connection_id).and_then(|c| c.agent_id)
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Number of connections that currently control an agent.
    pub async fn joined_count(&self) -> usize {
        self.connections.read().await.values().filter(|c| c.is_joined()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 40000))
    }

    #[tokio::test]
    async fn test_connection_cap_is_enforced() {
        let manager = ConnectionManager::new(2);
        let first = manager.add_connection(addr()).await;
        let second = manager.add_connection(addr()).await;
        assert!(first.is_some() && second.is_some());
        assert_ne!(first, second);
        assert!(manager.add_connection(addr()).await.is_none());

        manager.remove_connection(first.unwrap()).await;
        assert!(manager.add_connection(addr()).await.is_some());
    }

    #[tokio::test]
    async fn test_agent_assignment() {
        let manager = ConnectionManager::new(8);
        let id = manager.add_connection(addr()).await.unwrap();
        assert_eq!(manager.get_agent(id).await, None);

        manager.set_agent(id, Some(AgentId(7))).await;
        assert_eq!(manager.get_agent(id).await, Some(AgentId(7)));
        assert_eq!(manager.joined_count().await, 1);

        manager.set_agent(id, None).await;
        assert_eq!(manager.joined_count().await, 0);
        assert_eq!(manager.connection_count().await, 1);
    }
}
