//! Collision detection and elimination bookkeeping.
//!
//! Cross-agent checks run against a snapshot of every trail taken at the
//! start of the tick, so an agent's death (or capture) during the tick never
//! changes another agent's collision result for that same tick.

use crate::agent::{Agent, AgentId};
use crate::grid::Cell;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EliminationCause {
    /// The agent's trail crossed itself
    SelfIntersection,
    /// The agent ran into another agent's trail
    TrailCut,
    /// Two or more heads entered the same cell on the same tick
    HeadOn,
}

/// One agent eliminated during a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Elimination {
    pub victim: AgentId,
    pub killer: Option<AgentId>,
    pub cause: EliminationCause,
}

/// Every live agent's trail as it stood at the start of the tick.
#[derive(Debug, Default)]
pub struct TrailSnapshot {
    trails: Vec<(AgentId, HashSet<Cell>)>,
}

impl TrailSnapshot {
    pub fn capture<'a>(agents: impl IntoIterator<Item = &'a Agent>) -> Self {
        let trails = agents
            .into_iter()
            .filter(|agent| agent.alive && !agent.trail.is_empty())
            .map(|agent| (agent.id, agent.trail.cell_set().clone()))
            .collect();
        Self { trails }
    }

    /// The first agent other than `mover` whose start-of-tick trail holds `cell`.
    pub fn owner_of(&self, cell: Cell, mover: AgentId) -> Option<AgentId> {
        self.trails
            .iter()
            .find(|(id, cells)| *id != mover && cells.contains(&cell))
            .map(|(id, _)| *id)
    }
}

/// Where an agent's head ended the tick, and whether it moved to get there.
#[derive(Debug, Clone, Copy)]
pub struct HeadPosition {
    pub agent: AgentId,
    pub cell: Cell,
    pub moved: bool,
}

/// Resolves heads sharing a cell. Every agent in such a group dies, so the
/// outcome never depends on iteration order. At least one of them must have
/// moved into the cell this tick; agents merely standing together are left
/// alone. In a two-way collision each agent is reported as the other's killer.
pub fn head_on_collisions(heads: &[HeadPosition]) -> Vec<Elimination> {
    let mut by_cell: BTreeMap<Cell, Vec<HeadPosition>> = BTreeMap::new();
    for head in heads {
        by_cell.entry(head.cell).or_default().push(*head);
    }

    let mut eliminations = Vec::new();
    for group in by_cell.values() {
        if group.len() < 2 || !group.iter().any(|head| head.moved) {
            continue;
        }
        for head in group {
            let killer = if group.len() == 2 {
                group.iter().find(|other| other.agent != head.agent).map(|other| other.agent)
            } else {
                None
            };
            eliminations.push(Elimination {
                victim: head.agent,
                killer,
                cause: EliminationCause::HeadOn,
            });
        }
    }
    eliminations.sort_by_key(|e| e.victim);
    eliminations
}
