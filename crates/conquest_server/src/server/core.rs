//! Core game server implementation.
//!
//! This module contains the main `GameServer` struct and its implementation,
//! tying together the listener, the connection registry and the room.

use crate::{
    config::ServerConfig,
    connection::ConnectionManager,
    error::ServerError,
    room::RoomHandle,
    server::handlers::handle_connection,
    shutdown::ShutdownState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::Duration;
use tracing::{debug, error, info};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// The core game server structure.
///
/// `GameServer` owns one room and accepts WebSocket connections into it.
///
/// # Architecture
///
/// * **Room**: A tokio task owning the simulation, reached through a [`RoomHandle`]
/// * **Connection Management**: Admission, connection cap and agent mapping
/// * **Connection Handlers**: One task per client, see [`handle_connection`]
#[derive(Debug)]
pub struct GameServer {
    /// Server configuration parameters
    config: Arc<ServerConfig>,

    /// Manager for client connections
    connection_manager: Arc<ConnectionManager>,

    /// Handle to the hosted room
    room: RoomHandle,

    /// Channel for coordinating server shutdown
    shutdown_sender: broadcast::Sender<()>,
}

impl GameServer {
    /// Creates a new game server with the specified configuration.
    ///
    /// The room task is spawned immediately, so this must be called from
    /// within a tokio runtime.
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration parameters for server behavior
    pub fn new(config: ServerConfig) -> Self {
        let connection_manager = Arc::new(ConnectionManager::new(config.max_connections));
        let (room, _task) = RoomHandle::spawn(config.room.clone());
        let (shutdown_sender, _) = broadcast::channel(1);

        Self {
            config: Arc::new(config),
            connection_manager,
            room,
            shutdown_sender,
        }
    }

    /// Binds the configured address.
    ///
    /// Split from [`serve`](Self::serve) so callers can learn the actual
    /// address when binding port 0.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let listener = TcpListener::bind(self.config.bind_address)
            .await
            .map_err(|e| ServerError::Network(format!("Failed to bind {}: {e}", self.config.bind_address)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Network(format!("Failed to read local address: {e}")))?;
        info!("🚀 Game server listening on {}", local_addr);
        Ok(listener)
    }

    /// Starts the game server and runs until shutdown is initiated through
    /// `shutdown_state` or [`shutdown`](Self::shutdown) is called.
    pub async fn start_with_shutdown_state(&self, shutdown_state: ShutdownState) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener, Some(shutdown_state)).await
    }

    /// Starts the game server and begins accepting connections.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the server started and stopped cleanly, or a `ServerError`
    /// if binding failed.
    pub async fn start(&self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener, None).await
    }

    /// Runs the accept loop on an already bound listener.
    ///
    /// Each accepted connection gets its own task. The loop ends when the
    /// internal shutdown signal fires or the shutdown state is initiated.
    pub async fn serve(&self, listener: TcpListener, shutdown_state: Option<ShutdownState>) -> Result<(), ServerError> {
        let mut shutdown_receiver = self.shutdown_sender.subscribe();

        loop {
            if let Some(ref shutdown_state) = shutdown_state {
                if shutdown_state.is_shutdown_initiated() {
                    info!("🛑 Accept loop stopping - shutdown initiated");
                    break;
                }
            }

            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => self.spawn_connection(stream, addr),
                    Err(e) => {
                        // Usually transient (e.g. too many open files); back off and keep serving
                        error!("Failed to accept connection: {}", e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                _ = shutdown_receiver.recv() => {
                    info!("Internal shutdown signal received");
                    break;
                }
            }
        }

        info!("🧹 Performing server cleanup...");
        self.room.shutdown().await;
        if let Some(shutdown_state) = shutdown_state {
            shutdown_state.complete_shutdown();
        }
        info!("Server stopped");
        Ok(())
    }

    fn spawn_connection(&self, stream: tokio::net::TcpStream, addr: SocketAddr) {
        let connection_manager = self.connection_manager.clone();
        let room = self.room.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            match handle_connection(stream, addr, connection_manager, room, config).await {
                Ok(()) => debug!("Connection from {} finished", addr),
                Err(e) => error!("Connection error from {}: {}", addr, e),
            }
        });
    }

    /// Initiates server shutdown.
    ///
    /// Stops the accept loop; the room is stopped as part of its cleanup.
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        info!("🛑 Shutting down server...");
        let _ = self.shutdown_sender.send(());
        Ok(())
    }

    /// Gets a handle to the hosted room.
    pub fn room(&self) -> RoomHandle {
        self.room.clone()
    }

    /// Open connections, and how many of them control an agent.
    pub async fn connection_counts(&self) -> (usize, usize) {
        (
            self.connection_manager.connection_count().await,
            self.connection_manager.joined_count().await,
        )
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
