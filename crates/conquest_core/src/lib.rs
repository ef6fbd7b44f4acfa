//! # Conquest Core
//!
//! Authoritative, synchronous simulation for a real-time territory capture
//! game. Agents steer across a grid; leaving their territory lays a trail,
//! returning to it captures the trail and everything it encloses, and running
//! into a trail is fatal.
//!
//! The crate performs no I/O. A [`World`] is driven one tick at a time by its
//! owner (normally a room task in `conquest_server`) and exposes read-only
//! [`WorldSnapshot`]s for broadcasting.

pub mod agent;
pub mod capture;
pub mod collision;
pub mod error;
pub mod grid;
pub mod protocol;
pub mod rules;
pub mod world;

pub use agent::{color_for, Agent, AgentId, AgentState, CellOutcome, Intent, Trail};
pub use capture::{capture, CaptureOutcome};
pub use collision::{Elimination, EliminationCause};
pub use error::{CaptureError, InvariantViolation, JoinError};
pub use grid::{walk, Cell, Vec2, WorldBounds};
pub use protocol::{AgentSnapshot, ClientMessage, ServerMessage, WorldSnapshot};
pub use rules::Rules;
pub use world::{CaptureEvent, TickReport, World};
