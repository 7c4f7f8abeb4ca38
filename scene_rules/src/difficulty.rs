//! Difficulty tiers derived from cumulative player performance.

use serde::{Deserialize, Serialize};

/// One of three difficulty adjustments applied at scene start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyTier {
    Easier,
    Normal,
    Harder,
}

impl DifficultyTier {
    /// Pick a tier from the player's cumulative success rate and the number
    /// of attempts at the current scene. Repeated attempts or a low success
    /// rate ease the scene; a strong record on a first attempt hardens it.
    pub fn for_performance(success_rate: f64, scene_attempts: u32) -> Self {
        if success_rate < 0.3 || scene_attempts >= 3 {
            DifficultyTier::Easier
        } else if success_rate > 0.7 && scene_attempts <= 1 {
            DifficultyTier::Harder
        } else {
            DifficultyTier::Normal
        }
    }

    /// Multiplier applied to failure penalties.
    pub fn penalty_multiplier(&self) -> f64 {
        match self {
            DifficultyTier::Easier => 0.5,
            DifficultyTier::Normal => 1.0,
            DifficultyTier::Harder => 1.5,
        }
    }

    /// How often hints should be offered at this tier.
    pub fn hint_frequency(&self) -> &'static str {
        match self {
            DifficultyTier::Easier => "frequent",
            DifficultyTier::Normal => "normal",
            DifficultyTier::Harder => "sparse",
        }
    }

    /// Bonus (or penalty) applied to the starting primary resource.
    pub fn starting_resource_bonus(&self) -> f64 {
        match self {
            DifficultyTier::Easier => 10.0,
            DifficultyTier::Normal => 0.0,
            DifficultyTier::Harder => -10.0,
        }
    }
}
