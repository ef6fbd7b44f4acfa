//! Connection management for client connections.
//!
//! This module handles the lifecycle of client connections, including
//! connection tracking, agent assignment and per-connection session state.

pub mod client;
pub mod manager;
pub mod session;

pub use manager::ConnectionManager;
pub use session::Session;

/// Type alias for connection identifiers.
///
/// Connection IDs are used to uniquely identify client connections
/// throughout their lifecycle on the server.
pub type ConnectionId = usize;
