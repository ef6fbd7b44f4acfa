//! # Conquest Server
//!
//! Hosts a territory conquest room behind a WebSocket endpoint.
//!
//! ## Architecture Overview
//!
//! * **Room** - A tokio task that exclusively owns the simulation
//!   [`World`](conquest_core::World), runs the fixed-rate tick loop and
//!   broadcasts snapshots on a separate clock
//! * **Connection Manager** - Admission, connection cap and agent mapping
//! * **Connection Handlers** - One task per client: parse, validate and
//!   route its frames, forward room frames back to it
//!
//! ### Message Flow
//!
//! 1. Client sends a JSON text frame with an `{event, data}` structure
//! 2. The frame is size-checked and parsed into a `ClientMessage`
//! 3. `join`/`leave` become room commands; `setIntent` replaces the agent's
//!    pending intent in its mailbox
//! 4. The room ticks, publishes eliminations as they happen and full
//!    snapshots at the broadcast rate
//! 5. Every connection forwards those frames, dropping any it cannot keep
//!    up with
//!
//! ## Error Handling
//!
//! [`ServerError`] separates network failures and a closed room, which end
//! a connection, from rejected input and rejected joins, which are reported
//! to the client as `error` frames.

pub use config::{RoomConfig, SecurityConfig, ServerConfig};
pub use error::ServerError;
pub use room::{JoinTicket, MetricsSnapshot, RoomHandle, RoomMetrics};
pub use server::GameServer;
pub use shutdown::ShutdownState;
pub use utils::{create_server, create_server_with_config};

pub mod config;
pub mod error;
pub mod room;
pub mod security;
pub mod server;
pub mod shutdown;
pub mod utils;

// Internal modules (not part of public API)
mod connection;
mod messaging;
mod tests;
