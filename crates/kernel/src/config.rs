use glam::Vec2;
use serde::{Deserialize, Serialize};

/// World configuration. Every field has a default, so a partial JSON file
/// only needs to name what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Seed for the world RNG.
    pub seed: u64,
    /// Where new players appear on the starting map.
    pub spawn: Vec2,
    pub butterfly: ButterflyTuning,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            spawn: Vec2::ZERO,
            butterfly: ButterflyTuning::default(),
        }
    }
}

/// Knobs for the wandering butterfly behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButterflyTuning {
    /// Per-tick probability of picking a new random drift.
    pub wander_chance: f32,
    /// Scale of a random drift on each axis.
    pub wander_speed: f32,
    /// Players closer than this are fled from.
    pub flee_radius: f32,
    /// A player closer than this catches the butterfly.
    pub capture_radius: f32,
    /// Other butterflies closer than this are steered away from.
    pub crowd_radius: f32,
    /// Speed used when steering away from something.
    pub steer_speed: f32,
}

impl Default for ButterflyTuning {
    fn default() -> Self {
        Self {
            wander_chance: 0.005,
            wander_speed: 0.1,
            flee_radius: 3.0,
            capture_radius: 1.0,
            crowd_radius: 0.5,
            steer_speed: 0.1,
        }
    }
}
