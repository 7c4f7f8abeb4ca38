//! # Scene Rules
//!
//! The "Scene Bible" crate - contains the deterministic side of the narrative
//! session: scene state, safe condition evaluation, scene profiles and
//! thresholds, the cooldown-gated rule engine, and difficulty tiers.
//! This crate is the single source of truth for pacing rules and does not
//! contain any AI logic.

pub mod condition;
pub mod difficulty;
pub mod profile;
pub mod rules;
pub mod state;

pub use condition::*;
pub use difficulty::*;
pub use profile::*;
pub use rules::*;
pub use state::*;
