//! Error types for the simulation core.
//!
//! Simulation errors are always contained to a single agent within a single
//! tick; none of them is fatal to a world.

use crate::agent::AgentState;
use crate::grid::Cell;

/// Failures of the territory capture algorithm.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// The flood fill exceeded its work cap; the capture is dropped for this tick
    #[error("flood fill visited {visited} cells, exceeding the cap of {cap}")]
    WorkCapExceeded { visited: usize, cap: usize },
}

/// Reasons an agent could not be admitted to a world.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("world is full ({capacity} agents)")]
    WorldFull { capacity: usize },
}

/// A broken world invariant detected by the end-of-tick audit.
///
/// These are unreachable by construction. When one is found the affected
/// agent is reset to spawn state and the room keeps running.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("live agent owns no territory")]
    EmptyTerritory,
    #[error("trail cell {0} lies inside the agent's own territory")]
    TrailInsideTerritory(Cell),
    #[error("state {state:?} is inconsistent with a {trail_len}-cell trail")]
    StateMismatch { state: AgentState, trail_len: usize },
    #[error("score {actual} differs from derived score {expected}")]
    ScoreDrift { actual: u32, expected: u32 },
    #[error("position {0} is outside the world")]
    OutOfBounds(Cell),
}
