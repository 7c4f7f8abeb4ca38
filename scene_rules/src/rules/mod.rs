//! Deterministic, cooldown-gated pre-filter for pacing decisions.
//!
//! The rule engine answers cheaply before the director ever considers an
//! external model consultation. Rules are checked in strict priority order
//! and the first match wins; each rule is gated by its own wall-clock
//! cooldown so a condition that stays true does not fire on every
//! evaluation. When nothing matches the engine defers with
//! [`EngineAction::ConsultLlm`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::profile::SceneProfile;
use crate::state::SceneState;

/// How pointed a hint should be, escalating as the primary resource drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintSpecificity {
    Gentle,
    Direct,
    Explicit,
}

/// The rule engine's verdict for one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineAction {
    /// A phase time threshold was crossed.
    AdvancePhase { next_phase: String, reason: String },
    /// The primary resource is critical.
    SpawnCrisis { resource: String, reason: String },
    /// A resource is urgent (or the secondary resource is critical).
    TriggerUrgency { resource: String, reason: String },
    /// The player has been silent too long.
    PromptPlayer { reason: String },
    /// The player keeps failing; offer a hint.
    GiveHint {
        specificity: HintSpecificity,
        reason: String,
    },
    /// No deterministic rule matched; defer to the director.
    ConsultLlm,
}

/// Cooldown slots, one per rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CooldownKind {
    PhaseTransition,
    Crisis,
    Urgency,
    IdlePrompt,
    Hint,
    UrgentResource,
}

/// Deterministic pre-filter with per-rule wall-clock cooldowns.
#[derive(Debug, Default)]
pub struct RuleEngine {
    armed: HashMap<CooldownKind, Instant>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all cooldown timers (used on session restart).
    pub fn reset(&mut self) {
        self.armed.clear();
    }

    /// Time left before a cooldown expires, if it is armed.
    pub fn remaining_cooldown(
        &self,
        kind: CooldownKind,
        profile: &SceneProfile,
    ) -> Option<Duration> {
        let armed_at = self.armed.get(&kind)?;
        let duration = Self::cooldown_duration(kind, profile);
        duration.checked_sub(armed_at.elapsed())
    }

    /// Evaluate the rules in strict priority order, returning the first
    /// match and arming its cooldown.
    pub fn evaluate(
        &mut self,
        state: &SceneState,
        elapsed: Duration,
        idle: Duration,
        failed_attempts: u32,
        profile: &SceneProfile,
    ) -> EngineAction {
        // 1. Phase transition.
        if let Some(next_phase) = self.phase_due(state, elapsed, profile) {
            if self.try_arm(CooldownKind::PhaseTransition, profile) {
                let reason = format!(
                    "elapsed {:.0}s crossed the threshold for the current phase",
                    elapsed.as_secs_f64()
                );
                return EngineAction::AdvancePhase { next_phase, reason };
            }
        }

        // 2. Critical resources: primary spawns a crisis, secondary raises
        // urgency, each on its own cooldown.
        if let Some(value) = state.number(&profile.primary.key) {
            if profile.primary.is_critical(value) && self.try_arm(CooldownKind::Crisis, profile) {
                return EngineAction::SpawnCrisis {
                    resource: profile.primary.key.clone(),
                    reason: format!("{} at critical level {value:.1}", profile.primary.key),
                };
            }
        }
        if let Some(secondary) = &profile.secondary {
            if let Some(value) = state.number(&secondary.key) {
                if secondary.is_critical(value) && self.try_arm(CooldownKind::Urgency, profile) {
                    return EngineAction::TriggerUrgency {
                        resource: secondary.key.clone(),
                        reason: format!("{} at critical level {value:.1}", secondary.key),
                    };
                }
            }
        }

        // 3. Player idle.
        if idle.as_secs_f64() >= profile.idle_prompt_secs
            && self.try_arm(CooldownKind::IdlePrompt, profile)
        {
            return EngineAction::PromptPlayer {
                reason: format!("player silent for {:.0}s", idle.as_secs_f64()),
            };
        }

        // 4. Player struggling.
        if failed_attempts >= profile.struggle_attempts && self.try_arm(CooldownKind::Hint, profile)
        {
            return EngineAction::GiveHint {
                specificity: self.hint_specificity(state, profile),
                reason: format!("{failed_attempts} failed attempts"),
            };
        }

        // 5. Urgent but not yet critical resources.
        if let Some(action) = self.urgent_resource(state, profile) {
            return action;
        }

        EngineAction::ConsultLlm
    }

    fn phase_due(
        &self,
        state: &SceneState,
        elapsed: Duration,
        profile: &SceneProfile,
    ) -> Option<String> {
        let current_phase = state.text("phase")?;
        let threshold = profile.phases.iter().find(|p| p.phase == current_phase)?;
        let elapsed_secs = elapsed.as_secs_f64();

        if let Some(at) = threshold.at_elapsed_secs {
            if elapsed_secs >= at {
                return Some(threshold.next_phase.clone());
            }
        }
        if let (Some(at), Some(duration)) =
            (threshold.at_remaining_secs, profile.scene_duration_secs)
        {
            if duration - elapsed_secs <= at {
                return Some(threshold.next_phase.clone());
            }
        }
        None
    }

    fn urgent_resource(&mut self, state: &SceneState, profile: &SceneProfile) -> Option<EngineAction> {
        let mut urgent_key = None;
        if let Some(value) = state.number(&profile.primary.key) {
            if profile.primary.is_urgent(value) {
                urgent_key = Some((profile.primary.key.clone(), value));
            }
        }
        if urgent_key.is_none() {
            if let Some(secondary) = &profile.secondary {
                if let Some(value) = state.number(&secondary.key) {
                    if secondary.is_urgent(value) {
                        urgent_key = Some((secondary.key.clone(), value));
                    }
                }
            }
        }

        let (resource, value) = urgent_key?;
        if !self.try_arm(CooldownKind::UrgentResource, profile) {
            return None;
        }
        Some(EngineAction::TriggerUrgency {
            reason: format!("{resource} at urgent level {value:.1}"),
            resource,
        })
    }

    /// Hints get more explicit as the primary resource approaches critical.
    fn hint_specificity(&self, state: &SceneState, profile: &SceneProfile) -> HintSpecificity {
        match state.number(&profile.primary.key) {
            Some(value) if profile.primary.is_critical(value) => HintSpecificity::Explicit,
            Some(value) if profile.primary.is_urgent(value) => HintSpecificity::Direct,
            _ => HintSpecificity::Gentle,
        }
    }

    /// Check a cooldown and, when it is ready, arm it.
    fn try_arm(&mut self, kind: CooldownKind, profile: &SceneProfile) -> bool {
        let duration = Self::cooldown_duration(kind, profile);
        let ready = match self.armed.get(&kind) {
            Some(armed_at) => armed_at.elapsed() >= duration,
            None => true,
        };
        if ready {
            self.armed.insert(kind, Instant::now());
        }
        ready
    }

    fn cooldown_duration(kind: CooldownKind, profile: &SceneProfile) -> Duration {
        let secs = match kind {
            CooldownKind::PhaseTransition => profile.cooldowns.phase_transition_secs,
            CooldownKind::Crisis => profile.cooldowns.crisis_secs,
            CooldownKind::Urgency => profile.cooldowns.urgency_secs,
            CooldownKind::IdlePrompt => profile.cooldowns.idle_prompt_secs,
            CooldownKind::Hint => profile.cooldowns.hint_secs,
            CooldownKind::UrgentResource => profile.cooldowns.urgent_resource_secs,
        };
        Duration::from_secs_f64(secs.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileLibrary;

    fn submarine_state(oxygen: f64) -> SceneState {
        let mut state = SceneState::new();
        state.set("oxygen", oxygen);
        state.set("radiation", 10.0);
        state.set("phase", "exploration");
        state
    }

    fn library() -> ProfileLibrary {
        ProfileLibrary::builtin()
    }

    #[test]
    fn test_phase_transition_fires_once_then_cools_down() {
        let library = library();
        let profile = library.select("submarine");
        let mut engine = RuleEngine::new();
        let state = submarine_state(80.0);

        let first = engine.evaluate(
            &state,
            Duration::from_secs(240),
            Duration::ZERO,
            0,
            profile,
        );
        assert_eq!(
            first,
            EngineAction::AdvancePhase {
                next_phase: "complication".to_string(),
                reason: "elapsed 240s crossed the threshold for the current phase".to_string(),
            }
        );

        // Same inputs immediately again: the cooldown suppresses the rule
        // and nothing else matches.
        let second = engine.evaluate(
            &state,
            Duration::from_secs(240),
            Duration::ZERO,
            0,
            profile,
        );
        assert_eq!(second, EngineAction::ConsultLlm);
    }

    #[test]
    fn test_critical_primary_resource_spawns_crisis() {
        let library = library();
        let profile = library.select("submarine");
        let mut engine = RuleEngine::new();
        let mut state = submarine_state(15.0);
        state.set("phase", "climax"); // no phase threshold for climax

        let action = engine.evaluate(&state, Duration::from_secs(10), Duration::ZERO, 0, profile);
        assert!(matches!(
            action,
            EngineAction::SpawnCrisis { ref resource, .. } if resource == "oxygen"
        ));
    }

    #[test]
    fn test_critical_secondary_resource_triggers_urgency() {
        let library = library();
        let profile = library.select("submarine");
        let mut engine = RuleEngine::new();
        let mut state = submarine_state(80.0);
        state.set("phase", "climax");
        state.set("radiation", 85.0);

        let action = engine.evaluate(&state, Duration::from_secs(10), Duration::ZERO, 0, profile);
        assert!(matches!(
            action,
            EngineAction::TriggerUrgency { ref resource, .. } if resource == "radiation"
        ));
    }

    #[test]
    fn test_idle_prompt_and_cooldown() {
        let library = library();
        let profile = library.select("submarine");
        let mut engine = RuleEngine::new();
        let mut state = submarine_state(80.0);
        state.set("phase", "climax");

        let action = engine.evaluate(
            &state,
            Duration::from_secs(10),
            Duration::from_secs(50),
            0,
            profile,
        );
        assert!(matches!(action, EngineAction::PromptPlayer { .. }));

        let repeat = engine.evaluate(
            &state,
            Duration::from_secs(10),
            Duration::from_secs(50),
            0,
            profile,
        );
        assert_eq!(repeat, EngineAction::ConsultLlm);
    }

    #[test]
    fn test_hint_specificity_escalates() {
        let library = library();
        let profile = library.select("submarine");

        let mut engine = RuleEngine::new();
        let mut comfortable = submarine_state(80.0);
        comfortable.set("phase", "climax");
        let action = engine.evaluate(
            &comfortable,
            Duration::from_secs(10),
            Duration::ZERO,
            3,
            profile,
        );
        assert!(matches!(
            action,
            EngineAction::GiveHint {
                specificity: HintSpecificity::Gentle,
                ..
            }
        ));

        let mut engine = RuleEngine::new();
        let mut low = submarine_state(25.0);
        low.set("phase", "climax");
        // Oxygen 25 is urgent but not critical: hint escalates to Direct.
        let action = engine.evaluate(&low, Duration::from_secs(10), Duration::ZERO, 3, profile);
        assert!(matches!(
            action,
            EngineAction::GiveHint {
                specificity: HintSpecificity::Direct,
                ..
            }
        ));
    }

    #[test]
    fn test_urgent_resource_is_lowest_priority_before_deferral() {
        let library = library();
        let profile = library.select("submarine");
        let mut engine = RuleEngine::new();
        let mut state = submarine_state(25.0);
        state.set("phase", "climax");

        let action = engine.evaluate(&state, Duration::from_secs(10), Duration::ZERO, 0, profile);
        assert!(matches!(
            action,
            EngineAction::TriggerUrgency { ref resource, .. } if resource == "oxygen"
        ));

        let repeat = engine.evaluate(&state, Duration::from_secs(10), Duration::ZERO, 0, profile);
        assert_eq!(repeat, EngineAction::ConsultLlm);
    }

    #[test]
    fn test_reset_clears_cooldowns() {
        let library = library();
        let profile = library.select("submarine");
        let mut engine = RuleEngine::new();
        let state = submarine_state(80.0);

        engine.evaluate(
            &state,
            Duration::from_secs(240),
            Duration::ZERO,
            0,
            profile,
        );
        assert!(engine
            .remaining_cooldown(CooldownKind::PhaseTransition, profile)
            .is_some());

        engine.reset();
        assert!(engine
            .remaining_cooldown(CooldownKind::PhaseTransition, profile)
            .is_none());

        let again = engine.evaluate(
            &state,
            Duration::from_secs(240),
            Duration::ZERO,
            0,
            profile,
        );
        assert!(matches!(again, EngineAction::AdvancePhase { .. }));
    }
}
