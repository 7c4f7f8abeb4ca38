//! Scene profiles - externally supplied, read-only pacing configuration.
//!
//! A profile names the resource keys a scene uses, the thresholds the rule
//! engine checks, the cooldown durations that gate each rule, and the
//! success/failure condition expressions evaluated by the tick loop.
//! Profiles are selected by matching the scene identifier against each
//! profile's matcher list, with a default profile as the fallback.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::condition::{parse, ConditionParseError};

/// Errors raised while loading or validating profile configuration.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to parse profile TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("profile `{profile}` has an invalid {field} condition: {source}")]
    InvalidCondition {
        profile: String,
        field: &'static str,
        source: ConditionParseError,
    },

    #[error("profile `{0}` has an empty name")]
    EmptyName(String),
}

/// Direction in which a resource becomes dangerous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdDirection {
    /// Danger when the value falls to or below the threshold (e.g. oxygen).
    #[default]
    Depleting,
    /// Danger when the value rises to or above the threshold (e.g. radiation).
    Accumulating,
}

/// Critical and urgent levels for one resource key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceThresholds {
    pub key: String,
    pub critical: f64,
    pub urgent: f64,
    #[serde(default)]
    pub direction: ThresholdDirection,
}

impl ResourceThresholds {
    /// Whether `value` has crossed the critical threshold.
    pub fn is_critical(&self, value: f64) -> bool {
        match self.direction {
            ThresholdDirection::Depleting => value <= self.critical,
            ThresholdDirection::Accumulating => value >= self.critical,
        }
    }

    /// Whether `value` has crossed the urgent (but not critical) threshold.
    pub fn is_urgent(&self, value: f64) -> bool {
        match self.direction {
            ThresholdDirection::Depleting => value <= self.urgent,
            ThresholdDirection::Accumulating => value >= self.urgent,
        }
    }
}

/// A phase boundary within a scene. The transition fires when elapsed time
/// reaches `at_elapsed_secs`, or when remaining scene time (if the profile
/// declares a duration) falls to `at_remaining_secs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseThreshold {
    /// Phase this threshold applies to (matched against the `phase` state key).
    pub phase: String,
    /// Phase to advance into.
    pub next_phase: String,
    #[serde(default)]
    pub at_elapsed_secs: Option<f64>,
    #[serde(default)]
    pub at_remaining_secs: Option<f64>,
}

/// Cooldown durations, in seconds, per rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooldownConfig {
    pub phase_transition_secs: f64,
    pub crisis_secs: f64,
    pub urgency_secs: f64,
    pub idle_prompt_secs: f64,
    pub hint_secs: f64,
    pub urgent_resource_secs: f64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            phase_transition_secs: 60.0,
            crisis_secs: 45.0,
            urgency_secs: 30.0,
            idle_prompt_secs: 40.0,
            hint_secs: 35.0,
            urgent_resource_secs: 50.0,
        }
    }
}

/// Per-scene pacing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneProfile {
    pub name: String,
    /// Substrings matched (case-insensitively) against the scene id.
    #[serde(default)]
    pub scene_matchers: Vec<String>,

    /// Total scene duration, if the scene is time-boxed.
    #[serde(default)]
    pub scene_duration_secs: Option<f64>,
    #[serde(default)]
    pub phases: Vec<PhaseThreshold>,

    pub primary: ResourceThresholds,
    #[serde(default)]
    pub secondary: Option<ResourceThresholds>,

    /// Relationship/trust score key used by event deltas and the forced
    /// terminal check.
    pub relationship_key: String,
    /// Progress counter key (e.g. systems repaired), if the scene has one.
    #[serde(default)]
    pub repair_key: Option<String>,

    /// Seconds of player silence before an idle prompt.
    pub idle_prompt_secs: f64,
    /// Failed attempts before a hint is offered.
    pub struggle_attempts: u32,

    #[serde(default)]
    pub cooldowns: CooldownConfig,

    /// Terminal outcome expressions, parsed by the condition evaluator.
    #[serde(default)]
    pub success_condition: Option<String>,
    #[serde(default)]
    pub failure_condition: Option<String>,

    /// Per-tick deltas applied by the tick loop (e.g. oxygen drain).
    #[serde(default)]
    pub tick_drains: HashMap<String, f64>,

    /// Magnitude of state deltas for materialized crisis/help events.
    #[serde(default = "default_event_magnitude")]
    pub event_magnitude: f64,
}

fn default_event_magnitude() -> f64 {
    10.0
}

impl SceneProfile {
    /// Whether this profile matches a scene identifier.
    pub fn matches(&self, scene_id: &str) -> bool {
        let scene_id = scene_id.to_lowercase();
        self.scene_matchers
            .iter()
            .any(|matcher| scene_id.contains(&matcher.to_lowercase()))
    }

    /// Validate the profile: non-empty name and parseable conditions.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.name.trim().is_empty() {
            return Err(ProfileError::EmptyName(self.scene_matchers.join(",")));
        }
        for (field, expression) in [
            ("success", self.success_condition.as_deref()),
            ("failure", self.failure_condition.as_deref()),
        ] {
            if let Some(expression) = expression {
                parse(expression).map_err(|source| ProfileError::InvalidCondition {
                    profile: self.name.clone(),
                    field,
                    source,
                })?;
            }
        }
        Ok(())
    }
}

/// Top-level shape of a profile configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    profile: Vec<SceneProfile>,
    default: SceneProfile,
}

/// A set of scene profiles plus the default fallback.
#[derive(Debug, Clone)]
pub struct ProfileLibrary {
    profiles: Vec<SceneProfile>,
    default_profile: SceneProfile,
}

impl ProfileLibrary {
    /// Build a library from explicit parts.
    pub fn new(profiles: Vec<SceneProfile>, default_profile: SceneProfile) -> Self {
        Self {
            profiles,
            default_profile,
        }
    }

    /// Load and validate a library from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ProfileError> {
        let file: ProfileFile = toml::from_str(text)?;
        for profile in file.profile.iter().chain(std::iter::once(&file.default)) {
            profile.validate()?;
        }
        Ok(Self::new(file.profile, file.default))
    }

    /// Select the profile for a scene id, falling back to the default.
    pub fn select(&self, scene_id: &str) -> &SceneProfile {
        self.profiles
            .iter()
            .find(|p| p.matches(scene_id))
            .unwrap_or(&self.default_profile)
    }

    /// The fallback profile.
    pub fn default_profile(&self) -> &SceneProfile {
        &self.default_profile
    }

    /// Compiled-in profile set: a submarine scene plus a generic default.
    pub fn builtin() -> Self {
        let submarine = SceneProfile {
            name: "submarine".to_string(),
            scene_matchers: vec!["submarine".to_string(), "sub_".to_string()],
            scene_duration_secs: Some(900.0),
            phases: vec![
                PhaseThreshold {
                    phase: "exploration".to_string(),
                    next_phase: "complication".to_string(),
                    at_elapsed_secs: Some(240.0),
                    at_remaining_secs: None,
                },
                PhaseThreshold {
                    phase: "complication".to_string(),
                    next_phase: "climax".to_string(),
                    at_elapsed_secs: None,
                    at_remaining_secs: Some(180.0),
                },
            ],
            primary: ResourceThresholds {
                key: "oxygen".to_string(),
                critical: 15.0,
                urgent: 30.0,
                direction: ThresholdDirection::Depleting,
            },
            secondary: Some(ResourceThresholds {
                key: "radiation".to_string(),
                critical: 80.0,
                urgent: 60.0,
                direction: ThresholdDirection::Accumulating,
            }),
            relationship_key: "emotional_bond".to_string(),
            repair_key: Some("systems_repaired".to_string()),
            idle_prompt_secs: 45.0,
            struggle_attempts: 3,
            cooldowns: CooldownConfig::default(),
            success_condition: Some(
                "state['systems_repaired'] >= 3 and state['oxygen'] > 0".to_string(),
            ),
            failure_condition: Some("state['oxygen'] <= 0".to_string()),
            tick_drains: HashMap::from([
                ("oxygen".to_string(), -0.4),
                ("radiation".to_string(), 0.2),
            ]),
            event_magnitude: 10.0,
        };

        let default_profile = SceneProfile {
            name: "default".to_string(),
            scene_matchers: Vec::new(),
            scene_duration_secs: None,
            phases: Vec::new(),
            primary: ResourceThresholds {
                key: "stamina".to_string(),
                critical: 10.0,
                urgent: 25.0,
                direction: ThresholdDirection::Depleting,
            },
            secondary: None,
            relationship_key: "trust".to_string(),
            repair_key: None,
            idle_prompt_secs: 60.0,
            struggle_attempts: 4,
            cooldowns: CooldownConfig::default(),
            success_condition: None,
            failure_condition: Some("state['stamina'] <= 0".to_string()),
            tick_drains: HashMap::new(),
            event_magnitude: 8.0,
        };

        Self::new(vec![submarine], default_profile)
    }
}

impl Default for ProfileLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}
