//! Steering for a scripted agent that traces square loops.

use conquest_core::Cell;
use std::f32::consts::{FRAC_PI_2, PI};

/// East, south, west, north in screen coordinates. Consecutive legs turn
/// clockwise, so four legs of equal length close a square.
const LEGS: [f32; 4] = [0.0, FRAC_PI_2, PI, -FRAC_PI_2];

/// Updates without changing cell before a leg is considered blocked.
const STALL_LIMIT: u32 = 8;

/// Flies a square of `side` cells starting at the cell it is anchored on.
#[derive(Debug, Clone)]
pub struct SquarePilot {
    side: i32,
    first_leg: usize,
    leg: usize,
    leg_start: Cell,
    last_cell: Cell,
    stalled_for: u32,
}

impl SquarePilot {
    pub fn new(side: i32, first_leg: usize, anchor: Cell) -> Self {
        let first_leg = first_leg % LEGS.len();
        Self {
            side: side.max(1),
            first_leg,
            leg: first_leg,
            leg_start: anchor,
            last_cell: anchor,
            stalled_for: 0,
        }
    }

    /// Starts a fresh loop, e.g. after a respawn.
    pub fn anchor(&mut self, cell: Cell) {
        self.leg = self.first_leg;
        self.leg_start = cell;
        self.last_cell = cell;
        self.stalled_for = 0;
    }

    /// Heading of the current leg in radians.
    pub fn heading(&self) -> f32 {
        LEGS[self.leg]
    }

    /// Feeds the agent's current cell; returns true when the heading changed.
    pub fn update(&mut self, cell: Cell) -> bool {
        if cell == self.last_cell {
            self.stalled_for += 1;
        } else {
            self.stalled_for = 0;
            self.last_cell = cell;
        }

        let travelled = (cell.x - self.leg_start.x).abs() + (cell.y - self.leg_start.y).abs();
        // Clamped against a world edge: turn instead of pushing forever
        if travelled >= self.side || self.stalled_for >= STALL_LIMIT {
            self.leg = (self.leg + 1) % LEGS.len();
            self.leg_start = cell;
            self.stalled_for = 0;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turns_after_each_side() {
        let mut pilot = SquarePilot::new(3, 0, Cell::new(5, 5));
        assert_eq!(pilot.heading(), 0.0);

        assert!(!pilot.update(Cell::new(6, 5)));
        assert!(!pilot.update(Cell::new(7, 5)));
        assert!(pilot.update(Cell::new(8, 5)));
        assert_eq!(pilot.heading(), FRAC_PI_2);

        assert!(!pilot.update(Cell::new(8, 6)));
        assert!(!pilot.update(Cell::new(8, 7)));
        assert!(pilot.update(Cell::new(8, 8)));
        assert_eq!(pilot.heading(), PI);
    }

    #[test]
    fn test_stalled_leg_turns() {
        let mut pilot = SquarePilot::new(10, 1, Cell::new(0, 0));
        let turned = (0..STALL_LIMIT).map(|_| pilot.update(Cell::new(0, 0))).any(|t| t);
        assert!(turned);
        assert_eq!(pilot.heading(), PI);
    }

    #[test]
    fn test_anchor_restarts_the_loop() {
        let mut pilot = SquarePilot::new(1, 3, Cell::new(2, 2));
        assert!(pilot.update(Cell::new(2, 1)));
        assert_eq!(pilot.heading(), LEGS[0]);

        pilot.anchor(Cell::new(9, 9));
        assert_eq!(pilot.heading(), -FRAC_PI_2);
        assert!(!pilot.update(Cell::new(9, 9)));
    }
}
