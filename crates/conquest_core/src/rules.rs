//! Tunable rule set of the simulation engine.
//!
//! None of these values affect correctness invariants; they only shape how
//! the game plays. Every field has a serde default so partial configuration
//! files keep working.

use serde::{Deserialize, Serialize};

fn default_cell_size() -> f32 { 10.0 }
fn default_base_speed() -> f32 { 1.5 }
fn default_boost_multiplier() -> f32 { 1.8 }
fn default_seed_size() -> i32 { 3 }
fn default_min_capture_trail() -> usize { 3 }
fn default_respawn_delay_ticks() -> u64 { 90 }
fn default_kill_bonus() -> u32 { 50 }
fn default_spawn_attempts() -> u32 { 32 }
fn default_capture_work_factor() -> usize { 4 }
fn default_capture_margin() -> i32 { 1 }
fn default_max_agents() -> usize { 64 }

/// Game rules applied by [`World`](crate::World) on every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rules {
    /// Edge length of one grid cell in world units
    #[serde(default = "default_cell_size")]
    pub cell_size: f32,
    /// Distance travelled per tick without boost, in world units
    #[serde(default = "default_base_speed")]
    pub base_speed: f32,
    /// Speed multiplier while boosting. Boosting never costs territory.
    #[serde(default = "default_boost_multiplier")]
    pub boost_multiplier: f32,
    /// Edge length of the square territory block granted on join and respawn
    #[serde(default = "default_seed_size")]
    pub seed_size: i32,
    /// Trails shorter than this are discarded on re-entry instead of captured
    #[serde(default = "default_min_capture_trail")]
    pub min_capture_trail: usize,
    /// Ticks an eliminated agent waits before re-seeding (0 = next tick)
    #[serde(default = "default_respawn_delay_ticks")]
    pub respawn_delay_ticks: u64,
    /// Score credited to a trail owner for each agent that runs into its trail
    #[serde(default = "default_kill_bonus")]
    pub kill_bonus: u32,
    /// Random placements tried before spawning on occupied territory anyway
    #[serde(default = "default_spawn_attempts")]
    pub spawn_attempts: u32,
    /// Flood-fill work cap expressed as a multiple of the search box area
    #[serde(default = "default_capture_work_factor")]
    pub capture_work_factor: usize,
    /// Cells added around the trail's bounding box before flood filling
    #[serde(default = "default_capture_margin")]
    pub capture_margin: i32,
    /// Maximum number of agents admitted to one world
    #[serde(default = "default_max_agents")]
    pub max_agents: usize,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            cell_size: default_cell_size(),
            base_speed: default_base_speed(),
            boost_multiplier: default_boost_multiplier(),
            seed_size: default_seed_size(),
            min_capture_trail: default_min_capture_trail(),
            respawn_delay_ticks: default_respawn_delay_ticks(),
            kill_bonus: default_kill_bonus(),
            spawn_attempts: default_spawn_attempts(),
            capture_work_factor: default_capture_work_factor(),
            capture_margin: default_capture_margin(),
            max_agents: default_max_agents(),
        }
    }
}

impl Rules {
    /// Distance covered in one tick for the given boost state.
    pub fn speed(&self, boosting: bool) -> f32 {
        if boosting {
            self.base_speed * self.boost_multiplier
        } else {
            self.base_speed
        }
    }

    /// Number of cells in a freshly seeded territory.
    pub fn seed_area(&self) -> usize {
        let size = self.seed_size.max(1) as usize;
        size * size
    }

    /// Checks the rule set for values the engine cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err("cell_size must be a positive number".to_string());
        }
        if !(self.base_speed.is_finite() && self.base_speed >= 0.0) {
            return Err("base_speed must be a non-negative number".to_string());
        }
        if !(self.boost_multiplier.is_finite() && self.boost_multiplier >= 1.0) {
            return Err("boost_multiplier must be at least 1.0".to_string());
        }
        if self.seed_size < 1 {
            return Err("seed_size must be at least 1".to_string());
        }
        if self.capture_work_factor == 0 {
            return Err("capture_work_factor must be greater than 0".to_string());
        }
        if self.capture_margin < 1 {
            return Err("capture_margin must be at least 1".to_string());
        }
        if self.max_agents == 0 {
            return Err("max_agents must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_are_valid() {
        assert!(Rules::default().validate().is_ok());
    }

    #[test]
    fn test_boost_only_changes_speed() {
        let rules = Rules::default();
        assert_eq!(rules.speed(false), rules.base_speed);
        assert!(rules.speed(true) > rules.speed(false));
    }

    #[test]
    fn test_partial_rules_use_defaults() {
        let rules: Rules = serde_json::from_str(r#"{"seed_size": 5}"#).unwrap();
        assert_eq!(rules.seed_size, 5);
        assert_eq!(rules.seed_area(), 25);
        assert_eq!(rules.min_capture_trail, 3);
    }

    #[test]
    fn test_invalid_rules_rejected() {
        let mut rules = Rules::default();
        rules.capture_margin = 0;
        assert!(rules.validate().unwrap_err().contains("capture_margin"));

        let mut rules = Rules::default();
        rules.boost_multiplier = 0.5;
        assert!(rules.validate().is_err());
    }
}
