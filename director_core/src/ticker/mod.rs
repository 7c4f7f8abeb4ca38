//! The state tick loop: passive drains and terminal-outcome checks.
//!
//! Once per interval the ticker applies the profile's per-tick deltas to
//! the scene state and evaluates the terminal condition expressions. The
//! failure condition is checked before the success condition, so a state
//! satisfying both reads as a failure. Conditions are parsed once at
//! construction; a profile that fails to parse never produces a ticker.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use scene_rules::{parse, Condition, ConditionParseError, SceneProfile, SceneState};

/// How a scene ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TerminalOutcome {
    Success { reason: String },
    Failure { reason: String },
}

impl TerminalOutcome {
    pub fn reason(&self) -> &str {
        match self {
            TerminalOutcome::Success { reason } | TerminalOutcome::Failure { reason } => reason,
        }
    }
}

/// Applies passive drains and watches for terminal conditions.
pub struct StateTicker {
    interval: Duration,
    drains: Vec<(String, f64)>,
    success: Option<(Condition, String)>,
    failure: Option<(Condition, String)>,
}

impl StateTicker {
    /// Build a ticker from a scene profile, parsing its terminal
    /// condition expressions up front.
    pub fn for_profile(
        profile: &SceneProfile,
        interval: Duration,
    ) -> Result<Self, ConditionParseError> {
        let compile =
            |expression: Option<&str>| -> Result<Option<(Condition, String)>, ConditionParseError> {
                expression
                    .map(|text| Ok((parse(text)?, text.to_string())))
                    .transpose()
            };
        Ok(Self {
            interval,
            drains: profile
                .tick_drains
                .iter()
                .map(|(key, delta)| (key.clone(), *delta))
                .collect(),
            success: compile(profile.success_condition.as_deref())?,
            failure: compile(profile.failure_condition.as_deref())?,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one tick: apply drains to existing resource keys (clamped to
    /// the 0..100 percentage range), then check failure, then success.
    /// Keys absent from the state are left absent.
    pub fn tick_once(&self, state: &mut SceneState) -> Option<TerminalOutcome> {
        for (key, delta) in &self.drains {
            if state.contains(key) {
                state.apply_delta(key, *delta, 0.0, 100.0);
            }
        }

        if let Some((condition, expression)) = &self.failure {
            if condition.evaluate(state) {
                debug!(%expression, "failure condition met");
                return Some(TerminalOutcome::Failure {
                    reason: format!("failure condition met: {expression}"),
                });
            }
        }
        if let Some((condition, expression)) = &self.success {
            if condition.evaluate(state) {
                debug!(%expression, "success condition met");
                return Some(TerminalOutcome::Success {
                    reason: format!("success condition met: {expression}"),
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene_rules::ProfileLibrary;

    fn submarine_ticker() -> StateTicker {
        let library = ProfileLibrary::builtin();
        StateTicker::for_profile(library.select("submarine"), Duration::from_secs(1)).unwrap()
    }

    fn submarine_state() -> SceneState {
        [("oxygen", 50.0), ("radiation", 10.0), ("systems_repaired", 0.0)]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_drains_apply_each_tick() {
        let ticker = submarine_ticker();
        let mut state = submarine_state();

        assert!(ticker.tick_once(&mut state).is_none());
        assert_eq!(state.number("oxygen"), Some(49.6));
        assert_eq!(state.number("radiation"), Some(10.2));
    }

    #[test]
    fn test_drains_skip_missing_keys() {
        let ticker = submarine_ticker();
        let mut state: SceneState = [("oxygen", 50.0)].into_iter().collect();

        ticker.tick_once(&mut state);
        assert!(!state.contains("radiation"));
    }

    #[test]
    fn test_failure_when_oxygen_runs_out() {
        let ticker = submarine_ticker();
        let mut state = submarine_state();
        state.set("oxygen", 0.3);

        let outcome = ticker.tick_once(&mut state);
        assert!(matches!(outcome, Some(TerminalOutcome::Failure { .. })));
        assert_eq!(state.number("oxygen"), Some(0.0));
    }

    #[test]
    fn test_success_after_repairs() {
        let ticker = submarine_ticker();
        let mut state = submarine_state();
        state.set("systems_repaired", 3.0);

        let outcome = ticker.tick_once(&mut state);
        assert!(matches!(outcome, Some(TerminalOutcome::Success { .. })));
    }

    #[test]
    fn test_failure_checked_before_success() {
        let ticker = submarine_ticker();
        let mut state = submarine_state();
        state.set("systems_repaired", 3.0);
        state.set("oxygen", 0.2);

        // Drain pushes oxygen to zero, satisfying both expressions.
        let outcome = ticker.tick_once(&mut state);
        assert!(matches!(outcome, Some(TerminalOutcome::Failure { .. })));
    }

    #[test]
    fn test_radiation_clamped_at_ceiling() {
        let ticker = submarine_ticker();
        let mut state = submarine_state();
        state.set("radiation", 99.95);

        ticker.tick_once(&mut state);
        assert_eq!(state.number("radiation"), Some(100.0));
    }
}
