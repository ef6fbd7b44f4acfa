//! Error types and handling for the game server.
//!
//! This module defines the error types that can occur during server operations,
//! providing clear categorization of different failure modes.

use crate::security::SecurityError;
use conquest_core::JoinError;

/// Enumeration of possible server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Network-related errors such as binding failures or connection issues
    #[error("Network error: {0}")]
    Network(String),

    /// Internal server errors, e.g. failing to serialise a frame
    #[error("Internal error: {0}")]
    Internal(String),

    /// The room task has stopped and no longer accepts commands
    #[error("Room is closed")]
    RoomClosed,

    #[error("Join rejected: {0}")]
    Join(#[from] JoinError),

    /// A client frame failed validation
    #[error(transparent)]
    Security(#[from] SecurityError),
}

impl ServerError {
    /// Whether the connection that produced this error should be closed.
    /// Everything else is reported back to the client and the session goes on.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ServerError::Network(_) | ServerError::RoomClosed)
    }
}
