//! The simulation engine: one world, advanced one fixed tick at a time.
//!
//! A tick runs in four phases:
//!
//! 1. agents whose respawn delay has elapsed are re-seeded,
//! 2. every live agent's trail is snapshotted,
//! 3. agents move in id order, walking each crossed cell through their state
//!    machine and checking it against the snapshot,
//! 4. head-on collisions are resolved and the world is audited.
//!
//! Cross-agent outcomes only ever consult the snapshot from phase 2, so the
//! iteration order affects log ordering and nothing else.

use crate::agent::{Agent, AgentId, AgentState, CellOutcome, Intent};
use crate::collision::{head_on_collisions, Elimination, EliminationCause, HeadPosition, TrailSnapshot};
use crate::error::{InvariantViolation, JoinError};
use crate::grid::{walk, Cell, Vec2, WorldBounds};
use crate::protocol::{AgentSnapshot, WorldSnapshot};
use crate::rules::Rules;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use tracing::{debug, error, info};

/// A successful capture during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureEvent {
    pub agent: AgentId,
    pub trail_cells: usize,
    pub enclosed: usize,
}

/// Everything that happened during one tick.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub tick: u64,
    pub eliminations: Vec<Elimination>,
    pub captures: Vec<CaptureEvent>,
    pub respawned: Vec<AgentId>,
    /// Agents reset by the invariant audit
    pub repaired: Vec<AgentId>,
}

/// Authoritative state of one room's game.
#[derive(Debug)]
pub struct World {
    bounds: WorldBounds,
    rules: Rules,
    agents: BTreeMap<AgentId, Agent>,
    tick: u64,
    next_id: u32,
    rng: StdRng,
}

impl World {
    /// Creates an empty world. `seed` drives spawn placement only.
    pub fn new(bounds: WorldBounds, rules: Rules, seed: u64) -> Self {
        Self {
            bounds,
            rules,
            agents: BTreeMap::new(),
            tick: 0,
            next_id: 1,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn bounds(&self) -> WorldBounds {
        self.bounds
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    /// Admits a new agent at a random spawn block.
    ///
    /// Up to `spawn_attempts` placements are tried looking for a block that
    /// overlaps nobody's territory; after that the last candidate is used
    /// anyway. Fails only when the world is full.
    pub fn join(&mut self, name: impl Into<String>) -> Result<AgentId, JoinError> {
        self.ensure_capacity()?;
        let origin = spawn_origin(&mut self.rng, &self.agents, self.bounds, &self.rules, None);
        Ok(self.insert(name.into(), origin))
    }

    /// Admits a new agent whose seed block has its top-left corner at `origin`.
    pub fn spawn_at(&mut self, name: impl Into<String>, origin: Cell) -> Result<AgentId, JoinError> {
        self.ensure_capacity()?;
        Ok(self.insert(name.into(), origin))
    }

    /// Removes an agent immediately. Its territory disappears with it.
    pub fn leave(&mut self, id: AgentId) -> Option<Agent> {
        let agent = self.agents.remove(&id)?;
        info!("👋 {} ({}) left the world", agent.name, id);
        Some(agent)
    }

    /// Records the latest intent for an agent. It takes effect on the next
    /// tick; a later call before that tick replaces it.
    ///
    /// Returns `false` when the agent is unknown or the heading is not finite.
    pub fn set_intent(&mut self, id: AgentId, intent: Intent) -> bool {
        let Some(intent) = intent.sanitized() else {
            return false;
        };
        match self.agents.get_mut(&id) {
            Some(agent) => {
                agent.pending_intent = Some(intent);
                true
            }
            None => false,
        }
    }

    /// Advances the world by one tick.
    pub fn tick(&mut self) -> TickReport {
        self.tick += 1;
        let mut report = TickReport { tick: self.tick, ..TickReport::default() };

        self.respawn_due(&mut report);

        let trails = TrailSnapshot::capture(self.agents.values());
        let rules = &self.rules;
        let bounds = self.bounds;
        let respawn_at = self.tick + rules.respawn_delay_ticks;

        let mut eliminations = Vec::new();
        let mut heads = Vec::new();

        for agent in self.agents.values_mut() {
            if !agent.alive || report.respawned.contains(&agent.id) {
                continue;
            }

            agent.apply_pending_intent();
            let from = agent.cell(rules);
            let step = Vec2::from_heading(agent.heading).scaled(rules.speed(agent.boosting));
            agent.position = bounds.clamp(agent.position.offset(step), rules.cell_size);
            let to = agent.cell(rules);

            match advance(agent, from, to, &trails, rules, &mut report.captures) {
                Some(elimination) => {
                    agent.die(respawn_at);
                    eliminations.push(elimination);
                }
                None => heads.push(HeadPosition { agent: agent.id, cell: to, moved: from != to }),
            }
        }

        for elimination in head_on_collisions(&heads) {
            if let Some(agent) = self.agents.get_mut(&elimination.victim) {
                agent.die(respawn_at);
            }
            eliminations.push(elimination);
        }

        for elimination in &eliminations {
            if elimination.cause == EliminationCause::TrailCut {
                if let Some(killer) = elimination.killer.and_then(|id| self.agents.get_mut(&id)) {
                    killer.credit_kill(&self.rules);
                }
            }
            match elimination.killer {
                Some(killer) => info!("💀 {} eliminated by {} ({:?})", elimination.victim, killer, elimination.cause),
                None => info!("💀 {} eliminated ({:?})", elimination.victim, elimination.cause),
            }
        }
        report.eliminations = eliminations;

        for capture in &report.captures {
            debug!(
                "🏁 {} captured {} trail cells and {} enclosed cells",
                capture.agent, capture.trail_cells, capture.enclosed
            );
        }

        report.repaired = self.audit();
        report
    }

    /// Read-only view of the whole world for broadcasting.
    pub fn snapshot(&self) -> WorldSnapshot {
        let agents = self
            .agents
            .values()
            .map(|agent| {
                let mut territory: Vec<Cell> = agent.territory.iter().copied().collect();
                territory.sort_unstable();
                AgentSnapshot {
                    id: agent.id,
                    name: agent.name.clone(),
                    color: agent.color.clone(),
                    position: agent.position,
                    heading: agent.heading,
                    alive: agent.alive,
                    state: agent.state,
                    trail: agent.trail.cells().to_vec(),
                    territory,
                    score: agent.score,
                    kills: agent.kills,
                }
            })
            .collect();

        WorldSnapshot {
            tick: self.tick,
            width: self.bounds.width,
            height: self.bounds.height,
            cell_size: self.rules.cell_size,
            agents,
        }
    }

    fn ensure_capacity(&self) -> Result<(), JoinError> {
        if self.agents.len() >= self.rules.max_agents {
            return Err(JoinError::WorldFull { capacity: self.rules.max_agents });
        }
        Ok(())
    }

    fn insert(&mut self, name: String, origin: Cell) -> AgentId {
        let id = AgentId(self.next_id);
        self.next_id += 1;
        let agent = Agent::new(id, name, origin, &self.rules);
        info!("🧍 {} joined as {} at {}", agent.name, id, origin);
        self.agents.insert(id, agent);
        id
    }

    fn respawn_due(&mut self, report: &mut TickReport) {
        let due: Vec<AgentId> = self
            .agents
            .values()
            .filter(|agent| !agent.alive && agent.respawn_at.is_some_and(|at| at <= self.tick))
            .map(|agent| agent.id)
            .collect();

        for id in due {
            let origin = spawn_origin(&mut self.rng, &self.agents, self.bounds, &self.rules, Some(id));
            if let Some(agent) = self.agents.get_mut(&id) {
                agent.reseed(origin, &self.rules);
                debug!("🔄 {} respawned at {}", id, origin);
                report.respawned.push(id);
            }
        }
    }

    /// Checks every agent's invariants and resets any agent that breaks one.
    fn audit(&mut self) -> Vec<AgentId> {
        let broken: Vec<(AgentId, InvariantViolation)> = self
            .agents
            .values()
            .filter_map(|agent| check_invariants(agent, self.bounds, &self.rules).err().map(|e| (agent.id, e)))
            .collect();

        let mut repaired = Vec::with_capacity(broken.len());
        for (id, violation) in broken {
            error!("❌ Invariant violated for {}: {}; resetting to spawn state", id, violation);
            let origin = spawn_origin(&mut self.rng, &self.agents, self.bounds, &self.rules, Some(id));
            if let Some(agent) = self.agents.get_mut(&id) {
                agent.reseed(origin, &self.rules);
                repaired.push(id);
            }
        }
        repaired
    }
}

/// Walks one agent from `from` to `to`, cell by cell. Returns the elimination
/// that stopped it, if any.
fn advance(
    agent: &mut Agent,
    from: Cell,
    to: Cell,
    trails: &TrailSnapshot,
    rules: &Rules,
    captures: &mut Vec<CaptureEvent>,
) -> Option<Elimination> {
    for cell in walk(from, to) {
        if let Some(owner) = trails.owner_of(cell, agent.id) {
            return Some(Elimination {
                victim: agent.id,
                killer: Some(owner),
                cause: EliminationCause::TrailCut,
            });
        }
        match agent.enter_cell(cell, rules) {
            CellOutcome::SelfIntersection => {
                return Some(Elimination {
                    victim: agent.id,
                    killer: None,
                    cause: EliminationCause::SelfIntersection,
                });
            }
            CellOutcome::Captured { trail_cells, enclosed } => {
                captures.push(CaptureEvent { agent: agent.id, trail_cells, enclosed });
            }
            _ => {}
        }
    }
    None
}

fn spawn_origin(
    rng: &mut StdRng,
    agents: &BTreeMap<AgentId, Agent>,
    bounds: WorldBounds,
    rules: &Rules,
    exclude: Option<AgentId>,
) -> Cell {
    let size = rules.seed_size.max(1);
    let max_x = (bounds.width - size).max(0);
    let max_y = (bounds.height - size).max(0);

    let mut candidate = Cell::new(0, 0);
    for _ in 0..rules.spawn_attempts.max(1) {
        candidate = Cell::new(rng.gen_range(0..=max_x), rng.gen_range(0..=max_y));
        let occupied = Cell::square(candidate, size).any(|cell| {
            agents
                .values()
                .filter(|agent| Some(agent.id) != exclude)
                .any(|agent| agent.territory.contains(&cell))
        });
        if !occupied {
            return candidate;
        }
    }

    debug!("No free spawn block after {} attempts, placing at {}", rules.spawn_attempts, candidate);
    candidate
}

fn check_invariants(agent: &Agent, bounds: WorldBounds, rules: &Rules) -> Result<(), InvariantViolation> {
    let trail_len = agent.trail.len();

    if !agent.alive {
        if agent.state != AgentState::Dead || trail_len != 0 {
            return Err(InvariantViolation::StateMismatch { state: agent.state, trail_len });
        }
        return Ok(());
    }

    if agent.territory.is_empty() {
        return Err(InvariantViolation::EmptyTerritory);
    }

    let consistent = match agent.state {
        AgentState::Home => trail_len == 0,
        AgentState::Away => trail_len > 0,
        AgentState::Capturing | AgentState::Dead => false,
    };
    if !consistent {
        return Err(InvariantViolation::StateMismatch { state: agent.state, trail_len });
    }

    if let Some(cell) = agent.trail.cells().iter().find(|cell| agent.territory.contains(cell)) {
        return Err(InvariantViolation::TrailInsideTerritory(*cell));
    }

    let expected = (agent.territory.len() as u32).saturating_add(agent.kills.saturating_mul(rules.kill_bonus));
    if agent.score != expected {
        return Err(InvariantViolation::ScoreDrift { actual: agent.score, expected });
    }

    let cell = agent.cell(rules);
    if !bounds.contains(cell) {
        return Err(InvariantViolation::OutOfBounds(cell));
    }

    Ok(())
}
