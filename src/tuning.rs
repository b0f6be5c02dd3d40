//! Data-driven game balance
//!
//! Everything a designer might want to tweak without touching the loop.
//! Defaults reproduce the shipped game; a JSON override may set any subset.

use serde::{Deserialize, Serialize};

/// Closed integer box on the ground plane used for repositioning collectibles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnBounds {
    pub min_x: i32,
    pub max_x: i32,
    pub min_z: i32,
    pub max_z: i32,
}

impl SpawnBounds {
    pub const fn new(min_x: i32, max_x: i32, min_z: i32, max_z: i32) -> Self {
        Self {
            min_x,
            max_x,
            min_z,
            max_z,
        }
    }

    /// Whether a (x, z) pair lies inside the box (inclusive)
    pub fn contains(&self, x: f32, z: f32) -> bool {
        x >= self.min_x as f32
            && x <= self.max_x as f32
            && z >= self.min_z as f32
            && z <= self.max_z as f32
    }

    /// Swap inverted ends so sampling never sees an empty range
    pub fn normalized(self) -> Self {
        Self {
            min_x: self.min_x.min(self.max_x),
            max_x: self.min_x.max(self.max_x),
            min_z: self.min_z.min(self.max_z),
            max_z: self.min_z.max(self.max_z),
        }
    }
}

/// Game balance knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Score at start and after restart
    pub start_score: i32,
    /// Collectibles spawned per kind
    pub collectibles_per_kind: usize,
    /// Forward distance a collectible travels per frame
    pub collectible_speed: f32,
    /// Positional step applied per move key press
    pub move_step: f32,
    /// Vertical velocity set by a jump
    pub jump_velocity: f32,
    /// Range used at startup, after a pickup and on restart
    pub spawn_bounds: SpawnBounds,
    /// Range used when a collectible flies past the camera
    pub recycle_bounds: SpawnBounds,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            start_score: 5,
            collectibles_per_kind: 5,
            collectible_speed: 0.1,
            move_step: 0.1,
            jump_velocity: 4.0,
            spawn_bounds: SpawnBounds::new(-5, 5, -10, -5),
            recycle_bounds: SpawnBounds::new(-8, 8, -10, -5),
        }
    }
}

impl Tuning {
    /// Parse a (possibly partial) JSON override; missing fields keep defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let tuning: Self = serde_json::from_str(json)?;
        Ok(tuning.normalized())
    }

    /// Fix up values a hand-edited override could get wrong
    pub fn normalized(self) -> Self {
        Self {
            spawn_bounds: self.spawn_bounds.normalized(),
            recycle_bounds: self.recycle_bounds.normalized(),
            collectible_speed: self.collectible_speed.max(0.0),
            ..self
        }
    }
}
