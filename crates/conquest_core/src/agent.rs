//! Agents and the per-agent trail/territory state machine.
//!
//! An agent is one connected player's simulated entity. Its state machine is
//! evaluated once for every cell the agent enters:
//!
//! * `Home`: the current cell is owned territory and the trail is empty.
//! * `Away`: the agent is outside its territory and laying a trail.
//! * `Capturing`: transient; the agent re-entered territory with a trail and
//!   the capture algorithm is running.
//! * `Dead`: absorbing until an explicit respawn.

use crate::capture::{capture, CaptureOutcome};
use crate::error::CaptureError;
use crate::grid::{Cell, Vec2};
use crate::rules::Rules;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::f32::consts::{PI, TAU};
use std::fmt;
use tracing::{debug, warn};

/// Stable identity of an agent inside one world. Allocated in join order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub u32);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

const PALETTE: [&str; 12] = [
    "#e6194b", "#3cb44b", "#ffe119", "#4363d8", "#f58231", "#911eb4",
    "#46f0f0", "#f032e6", "#bcf60c", "#fabebe", "#008080", "#9a6324",
];

/// Display color for an agent, cycling through a fixed palette.
pub fn color_for(id: AgentId) -> String {
    PALETTE[id.0 as usize % PALETTE.len()].to_string()
}

/// Latest steering input from a client.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Intent {
    /// Heading in radians
    pub heading: f32,
    pub boosting: bool,
}

impl Intent {
    /// Returns the intent with its heading normalised to `[-π, π)`, or `None`
    /// when the heading is not a finite number.
    pub fn sanitized(self) -> Option<Self> {
        if !self.heading.is_finite() {
            return None;
        }
        let heading = (self.heading + PI).rem_euclid(TAU) - PI;
        Some(Self { heading, boosting: self.boosting })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AgentState {
    Home,
    Away,
    Capturing,
    Dead,
}

/// Result of appending a cell to a trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailStep {
    /// Same cell as the current tip; nothing appended
    Unchanged,
    Extended,
    /// The cell already appears earlier in the trail
    Crossed,
}

/// Ordered path traced since the agent last stood on its own territory.
///
/// Keeps a hash index next to the ordered cells so the self-intersection
/// test does not scan the whole path.
#[derive(Debug, Clone, Default)]
pub struct Trail {
    cells: Vec<Cell>,
    index: HashSet<Cell>,
}

impl Trail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cell: Cell) -> TrailStep {
        if self.cells.last() == Some(&cell) {
            return TrailStep::Unchanged;
        }
        if self.index.contains(&cell) {
            return TrailStep::Crossed;
        }
        self.cells.push(cell);
        self.index.insert(cell);
        TrailStep::Extended
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.index.contains(&cell)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.index.clear();
    }

    /// Set view of the trail, used for start-of-tick collision snapshots.
    pub fn cell_set(&self) -> &HashSet<Cell> {
        &self.index
    }
}

/// What happened when an agent entered one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellOutcome {
    /// Still on own territory with no trail
    Home,
    /// Same cell as the trail tip (sub-cell movement)
    Unchanged,
    /// First cell outside territory; the trail starts here
    LeftHome,
    Extended,
    /// The trail crossed itself; the agent must die
    SelfIntersection,
    /// Re-entered territory and captured the loop
    Captured { trail_cells: usize, enclosed: usize },
    /// Re-entered territory with a trail too short to enclose anything
    Discarded,
    /// The capture guard tripped; the trail is kept and the agent stays away
    CaptureDropped,
}

/// One connected player's simulated entity.
#[derive(Debug, Clone)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub color: String,
    pub position: Vec2,
    pub heading: f32,
    pub boosting: bool,
    pub alive: bool,
    pub state: AgentState,
    pub trail: Trail,
    pub territory: HashSet<Cell>,
    pub kills: u32,
    pub score: u32,
    /// Tick at which a dead agent re-seeds
    pub respawn_at: Option<u64>,
    /// Latest intent received since the previous tick
    pub(crate) pending_intent: Option<Intent>,
}

impl Agent {
    /// Creates a live agent standing in the middle of a fresh seed block.
    pub fn new(id: AgentId, name: String, origin: Cell, rules: &Rules) -> Self {
        let mut agent = Self {
            id,
            name,
            color: color_for(id),
            position: Vec2::default(),
            heading: 0.0,
            boosting: false,
            alive: true,
            state: AgentState::Home,
            trail: Trail::new(),
            territory: HashSet::new(),
            kills: 0,
            score: 0,
            respawn_at: None,
            pending_intent: None,
        };
        agent.reseed(origin, rules);
        agent
    }

    /// The cell the agent currently occupies.
    pub fn cell(&self, rules: &Rules) -> Cell {
        self.position.cell(rules.cell_size)
    }

    /// Resets the agent to a trail-empty `Home` state on a fresh seed block.
    pub fn reseed(&mut self, origin: Cell, rules: &Rules) {
        let size = rules.seed_size.max(1);
        let spawn = Cell::new(origin.x + (size - 1) / 2, origin.y + (size - 1) / 2);
        self.territory = Cell::square(origin, size).collect();
        self.trail.clear();
        self.position = spawn.center(rules.cell_size);
        self.alive = true;
        self.state = AgentState::Home;
        self.respawn_at = None;
        self.kills = 0;
        self.boosting = false;
        self.pending_intent = None;
        self.recompute_score(rules);
    }

    /// Score is derived, never mutated directly.
    pub fn recompute_score(&mut self, rules: &Rules) {
        let territory = self.territory.len() as u32;
        self.score = territory.saturating_add(self.kills.saturating_mul(rules.kill_bonus));
    }

    /// Marks the agent eliminated. The trail is discarded; territory stays
    /// visible until the respawn re-seeds it.
    pub fn die(&mut self, respawn_at: u64) {
        self.alive = false;
        self.state = AgentState::Dead;
        self.trail.clear();
        self.boosting = false;
        self.respawn_at = Some(respawn_at);
    }

    pub fn credit_kill(&mut self, rules: &Rules) {
        self.kills = self.kills.saturating_add(1);
        self.recompute_score(rules);
    }

    /// Applies the latest intent, if any arrived since the last tick.
    pub(crate) fn apply_pending_intent(&mut self) {
        if let Some(intent) = self.pending_intent.take() {
            self.heading = intent.heading;
            self.boosting = intent.boosting;
        }
    }

    /// Runs the trail/territory state machine for one entered cell.
    pub fn enter_cell(&mut self, cell: Cell, rules: &Rules) -> CellOutcome {
        if !self.alive {
            return CellOutcome::Unchanged;
        }

        if self.territory.contains(&cell) {
            if self.trail.is_empty() {
                self.state = AgentState::Home;
                return CellOutcome::Home;
            }
            return self.close_loop(rules);
        }

        let was_home = self.trail.is_empty();
        match self.trail.push(cell) {
            TrailStep::Unchanged => CellOutcome::Unchanged,
            TrailStep::Crossed => CellOutcome::SelfIntersection,
            TrailStep::Extended => {
                self.state = AgentState::Away;
                if was_home {
                    CellOutcome::LeftHome
                } else {
                    CellOutcome::Extended
                }
            }
        }
    }

    fn close_loop(&mut self, rules: &Rules) -> CellOutcome {
        if self.trail.len() < rules.min_capture_trail {
            debug!("{} returned home with a {}-cell trail, nothing to capture", self.id, self.trail.len());
            self.trail.clear();
            self.state = AgentState::Home;
            return CellOutcome::Discarded;
        }

        self.state = AgentState::Capturing;
        match capture(&self.territory, self.trail.cells(), rules) {
            Ok(outcome) => {
                let CaptureOutcome { trail_cells, enclosed } = outcome;
                let result = CellOutcome::Captured {
                    trail_cells: trail_cells.len(),
                    enclosed: enclosed.len(),
                };
                self.territory.extend(trail_cells);
                self.territory.extend(enclosed);
                self.trail.clear();
                self.state = AgentState::Home;
                self.recompute_score(rules);
                result
            }
            Err(CaptureError::WorkCapExceeded { visited, cap }) => {
                warn!(
                    "⚠️ Capture dropped for {}: flood fill visited {} cells (cap {})",
                    self.id, visited, cap
                );
                self.state = AgentState::Away;
                CellOutcome::CaptureDropped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> Rules {
        Rules {
            cell_size: 1.0,
            base_speed: 1.0,
            seed_size: 2,
            ..Rules::default()
        }
    }

    fn agent_at(origin: Cell) -> Agent {
        Agent::new(AgentId(1), "tester".to_string(), origin, &rules())
    }

    #[test]
    fn test_new_agent_is_home_on_seed_block() {
        let agent = agent_at(Cell::new(3, 3));
        assert!(agent.alive);
        assert_eq!(agent.state, AgentState::Home);
        assert_eq!(agent.territory.len(), 4);
        assert_eq!(agent.score, 4);
        assert_eq!(agent.cell(&rules()), Cell::new(3, 3));
        assert!(agent.trail.is_empty());
    }

    #[test]
    fn test_leaving_home_starts_trail_at_first_outside_cell() {
        let mut agent = agent_at(Cell::new(3, 3));
        let rules = rules();
        assert_eq!(agent.enter_cell(Cell::new(4, 3), &rules), CellOutcome::Home);
        assert_eq!(agent.enter_cell(Cell::new(5, 3), &rules), CellOutcome::LeftHome);
        assert_eq!(agent.state, AgentState::Away);
        assert_eq!(agent.trail.cells(), &[Cell::new(5, 3)]);
    }

    #[test]
    fn test_same_cell_is_not_duplicated() {
        let mut agent = agent_at(Cell::new(3, 3));
        let rules = rules();
        agent.enter_cell(Cell::new(5, 3), &rules);
        assert_eq!(agent.enter_cell(Cell::new(5, 3), &rules), CellOutcome::Unchanged);
        assert_eq!(agent.trail.len(), 1);
    }

    #[test]
    fn test_revisiting_trail_cell_is_self_intersection() {
        let mut agent = agent_at(Cell::new(0, 0));
        let rules = rules();
        for cell in [Cell::new(2, 0), Cell::new(3, 0), Cell::new(3, 1), Cell::new(2, 1)] {
            agent.enter_cell(cell, &rules);
        }
        assert_eq!(agent.enter_cell(Cell::new(2, 0), &rules), CellOutcome::SelfIntersection);
    }

    #[test]
    fn test_short_trail_is_discarded() {
        let mut agent = agent_at(Cell::new(3, 3));
        let rules = rules();
        agent.enter_cell(Cell::new(5, 3), &rules);
        assert_eq!(agent.enter_cell(Cell::new(4, 3), &rules), CellOutcome::Discarded);
        assert_eq!(agent.state, AgentState::Home);
        assert!(agent.trail.is_empty());
        assert_eq!(agent.territory.len(), 4);
    }

    #[test]
    fn test_closing_loop_captures() {
        let mut agent = agent_at(Cell::new(3, 3));
        let rules = rules();
        for cell in [Cell::new(5, 3), Cell::new(5, 4), Cell::new(5, 5), Cell::new(4, 5), Cell::new(3, 5)] {
            agent.enter_cell(cell, &rules);
        }
        let outcome = agent.enter_cell(Cell::new(3, 4), &rules);
        assert_eq!(outcome, CellOutcome::Captured { trail_cells: 5, enclosed: 0 });
        assert_eq!(agent.territory.len(), 9);
        assert_eq!(agent.score, 9);
        assert_eq!(agent.state, AgentState::Home);
        assert!(agent.trail.is_empty());
    }

    #[test]
    fn test_dead_agent_keeps_territory_until_reseed() {
        let mut agent = agent_at(Cell::new(3, 3));
        let rules = rules();
        agent.enter_cell(Cell::new(5, 3), &rules);
        agent.die(10);
        assert_eq!(agent.state, AgentState::Dead);
        assert!(agent.trail.is_empty());
        assert_eq!(agent.territory.len(), 4);

        agent.reseed(Cell::new(0, 0), &rules);
        assert!(agent.alive);
        assert_eq!(agent.territory.len(), rules.seed_area());
        assert_eq!(agent.respawn_at, None);
    }

    #[test]
    fn test_intent_sanitization() {
        assert!(Intent { heading: f32::NAN, boosting: false }.sanitized().is_none());
        assert!(Intent { heading: f32::INFINITY, boosting: true }.sanitized().is_none());

        let wrapped = Intent { heading: 3.0 * PI, boosting: true }.sanitized().unwrap();
        assert!(wrapped.heading >= -PI && wrapped.heading <= PI);
        assert!((wrapped.heading.abs() - PI).abs() < 1e-4);
        assert!(wrapped.boosting);
    }

    #[test]
    fn test_kill_bonus_feeds_score() {
        let mut agent = agent_at(Cell::new(0, 0));
        let rules = rules();
        agent.credit_kill(&rules);
        assert_eq!(agent.kills, 1);
        assert_eq!(agent.score, 4 + rules.kill_bonus);
    }
}
