//! # Director Core (Proscenium)
//!
//! The orchestration brain of an interactive narrative session. This crate
//! interfaces with `scene_rules`, decides what happens next, and serializes
//! the narrator's outgoing utterances.
//!
//! ## Core Components
//!
//! - **llm**: The narrow seam to the external language model
//! - **fuzzy**: Cached/latched natural-language condition evaluation
//! - **director**: Rule-engine pre-filter plus structured model consultation
//! - **delivery**: Priority, cancellation, and minimum-gap pacing of utterances
//! - **ticker**: Periodic resource drains and terminal-outcome detection
//! - **session**: Per-session wiring of the above
//!
//! ## Design Philosophy
//!
//! - **Fail closed**: A degraded model dependency manifests as "nothing
//!   unusual happens", never as a visible failure
//! - **Deterministic first**: Cheap rules answer before the expensive model
//!   is ever consulted
//! - **Session-owned state**: Caches, latches, and cooldowns are explicit
//!   per-session instances; sharing across sessions is opt-in

pub mod delivery;
pub mod director;
pub mod fuzzy;
pub mod llm;
pub mod session;
pub mod ticker;

pub use delivery::*;
pub use director::*;
pub use fuzzy::*;
pub use llm::*;
pub use session::*;
pub use ticker::*;
