//! The narrative director: decides what happens next.
//!
//! The director consults the deterministic rule engine first; only when the
//! rules defer does it build context and ask the external model for a
//! structured decision. Every failure mode on the model path degrades to
//! [`DirectorDecision::Continue`] - a degraded dependency manifests as
//! "nothing unusual happens", never as a visible error.

mod trends;

pub use trends::*;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use scene_rules::{
    DifficultyTier, EngineAction, HintSpecificity, RuleEngine, SceneProfile, SceneState,
};

use crate::llm::LanguageModel;
use crate::ticker::TerminalOutcome;

/// Consultations suppressed after a spawned event.
const COOLDOWN_AFTER_SPAWN: u32 = 5;
/// Consultations suppressed after a hint or behavior adjustment.
const COOLDOWN_AFTER_NUDGE: u32 = 3;
/// Failed actions that force the scene to end.
const FAILED_ACTION_CEILING: u32 = 10;
/// Relationship score below which, combined with a critical primary
/// resource, the scene is forced to end.
const RELATIONSHIP_COLLAPSE: f64 = -20.0;
/// History lines included in the consultation context.
const HISTORY_WINDOW: usize = 6;

/// Read-only player record supplied by the persistence collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub successes: u32,
    pub failures: u32,
    /// Attempts per scene id.
    #[serde(default)]
    pub scene_attempts: HashMap<String, u32>,
    /// Free-text personality summary.
    #[serde(default)]
    pub personality_summary: String,
}

impl PlayerProfile {
    /// Cumulative success rate; neutral 0.5 with no history.
    pub fn success_rate(&self) -> f64 {
        let total = self.successes + self.failures;
        if total == 0 {
            0.5
        } else {
            f64::from(self.successes) / f64::from(total)
        }
    }

    pub fn attempts_for(&self, scene_id: &str) -> u32 {
        self.scene_attempts.get(scene_id).copied().unwrap_or(0)
    }
}

/// Kinds of dynamically materialized events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Crisis,
    Help,
    Challenge,
}

/// State deltas plus narration for a materialized event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEffect {
    pub deltas: HashMap<String, f64>,
    pub narrative: String,
}

/// The director's verdict for one consultation cycle. Created fresh per
/// evaluation and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectorDecision {
    Continue {
        reason: String,
    },
    SpawnEvent {
        kind: EventKind,
        description: String,
        reason: String,
    },
    AdjustNpc {
        behavior_change: String,
        reason: String,
    },
    GiveHint {
        hint_type: String,
        content: String,
        reason: String,
    },
    Transition {
        next_scene: String,
        reason: String,
    },
}

/// Tension assessment reported by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensionLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum DirectiveAction {
    Continue,
    SpawnEvent,
    AdjustNpc,
    GiveHint,
    Transition,
}

/// The structured decision shape requested from the model.
#[derive(Debug, Clone, Deserialize)]
struct LlmDirective {
    assessment: String,
    tension_level: TensionLevel,
    player_struggling: bool,
    action: DirectiveAction,
    #[serde(default)]
    details: serde_json::Value,
}

/// Everything one consultation needs to see.
#[derive(Debug)]
pub struct ConsultRequest<'a> {
    pub scene_id: &'a str,
    pub state: &'a SceneState,
    pub recent_history: &'a [String],
    pub player: &'a PlayerProfile,
    pub actor_id: &'a str,
    pub last_action: &'a str,
    pub elapsed: Duration,
    pub idle: Duration,
    pub failed_attempts: u32,
    pub profile: &'a SceneProfile,
}

/// Rule-engine pre-filter plus structured model consultation.
pub struct NarrativeDirector {
    model: Arc<dyn LanguageModel>,
    rules: RuleEngine,
    trends: TemporalTrends,
    decision_cooldown: u32,
}

impl NarrativeDirector {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            rules: RuleEngine::new(),
            trends: TemporalTrends::new(),
            decision_cooldown: 0,
        }
    }

    /// Clear rule cooldowns, trend windows, and the decision cooldown
    /// (scene/session restart).
    pub fn reset(&mut self) {
        self.rules.reset();
        self.trends.reset();
        self.decision_cooldown = 0;
    }

    /// Record a primary-resource reading into the trend window.
    pub fn record_reading(&mut self, value: f64) {
        self.trends.record_reading(value);
    }

    /// Record a player action into the trend window.
    pub fn record_action(&mut self) {
        self.trends.record_action();
    }

    /// Decide what happens next.
    ///
    /// The global decision cooldown bounds consultation frequency
    /// independently of the rule engine's own cooldowns: while it is
    /// positive nothing is consulted at all.
    pub async fn consult(&mut self, request: ConsultRequest<'_>) -> DirectorDecision {
        self.decision_cooldown = self.decision_cooldown.saturating_sub(1);
        if self.decision_cooldown > 0 {
            return DirectorDecision::Continue {
                reason: "decision cooldown active".to_string(),
            };
        }

        let engine_action = self.rules.evaluate(
            request.state,
            request.elapsed,
            request.idle,
            request.failed_attempts,
            request.profile,
        );
        if engine_action != EngineAction::ConsultLlm {
            debug!(?engine_action, "rule engine decided without consultation");
            return Self::translate(engine_action);
        }

        let prompt = self.build_context(&request);
        let decision = match self.model.complete(&prompt).await {
            Ok(response) => match parse_directive(&response) {
                Some(directive) => {
                    debug!(
                        assessment = %directive.assessment,
                        tension = ?directive.tension_level,
                        struggling = directive.player_struggling,
                        "director consultation parsed"
                    );
                    Self::from_directive(directive)
                }
                None => {
                    warn!("unparseable director response; continuing");
                    DirectorDecision::Continue {
                        reason: "unparseable model decision".to_string(),
                    }
                }
            },
            Err(err) => {
                warn!(error = %err, "director model call failed; continuing");
                DirectorDecision::Continue {
                    reason: "model call failed".to_string(),
                }
            }
        };

        self.decision_cooldown = match &decision {
            DirectorDecision::SpawnEvent { .. } => COOLDOWN_AFTER_SPAWN,
            DirectorDecision::GiveHint { .. } | DirectorDecision::AdjustNpc { .. } => {
                COOLDOWN_AFTER_NUDGE
            }
            _ => self.decision_cooldown,
        };
        decision
    }

    /// 1:1 mapping of rule-engine actions onto director decisions.
    fn translate(action: EngineAction) -> DirectorDecision {
        match action {
            EngineAction::AdvancePhase { next_phase, reason } => DirectorDecision::Transition {
                next_scene: next_phase,
                reason,
            },
            EngineAction::SpawnCrisis { resource, reason } => DirectorDecision::SpawnEvent {
                kind: EventKind::Crisis,
                description: format!("{resource} emergency"),
                reason,
            },
            EngineAction::TriggerUrgency { resource, reason } => DirectorDecision::AdjustNpc {
                behavior_change: behavior_directive(&format!("urgent: {resource} is slipping")),
                reason,
            },
            EngineAction::PromptPlayer { reason } => DirectorDecision::AdjustNpc {
                behavior_change: "Address the player directly and ask what they want to do."
                    .to_string(),
                reason,
            },
            EngineAction::GiveHint {
                specificity,
                reason,
            } => DirectorDecision::GiveHint {
                hint_type: hint_type_label(specificity).to_string(),
                content: hint_for(specificity).to_string(),
                reason,
            },
            EngineAction::ConsultLlm => DirectorDecision::Continue {
                reason: "rule engine deferred".to_string(),
            },
        }
    }

    fn from_directive(directive: LlmDirective) -> DirectorDecision {
        let details = &directive.details;
        let detail = |key: &str| -> Option<String> {
            details.get(key).and_then(|v| v.as_str()).map(str::to_string)
        };
        let reason = detail("reason").unwrap_or_else(|| "model decision".to_string());

        match directive.action {
            DirectiveAction::Continue => DirectorDecision::Continue { reason },
            DirectiveAction::SpawnEvent => {
                let kind = match detail("event_type").as_deref() {
                    Some("crisis") => EventKind::Crisis,
                    Some("help") => EventKind::Help,
                    _ => EventKind::Challenge,
                };
                DirectorDecision::SpawnEvent {
                    kind,
                    description: detail("event_description")
                        .unwrap_or_else(|| "an unexpected development".to_string()),
                    reason,
                }
            }
            DirectiveAction::AdjustNpc => DirectorDecision::AdjustNpc {
                behavior_change: behavior_directive(
                    &detail("behavior_change").unwrap_or_default(),
                ),
                reason,
            },
            DirectiveAction::GiveHint => DirectorDecision::GiveHint {
                hint_type: detail("hint_type").unwrap_or_else(|| "gentle".to_string()),
                content: hint_directive(&detail("hint_content").unwrap_or_default()),
                reason,
            },
            DirectiveAction::Transition => DirectorDecision::Transition {
                next_scene: detail("next_scene").unwrap_or_else(|| "epilogue".to_string()),
                reason,
            },
        }
    }

    fn build_context(&self, request: &ConsultRequest<'_>) -> String {
        let history_tail: Vec<&str> = request
            .recent_history
            .iter()
            .rev()
            .take(HISTORY_WINDOW)
            .rev()
            .map(String::as_str)
            .collect();
        let state_summary: Vec<String> = request
            .state
            .iter()
            .map(|(key, value)| format!("{key}={value:?}"))
            .collect();

        format!(
            "You are directing an interactive narrative scene.\n\
             Scene: {scene} (attempt {attempts}, elapsed {elapsed:.0}s)\n\
             Actor in focus: {actor}\n\
             State: {state}\n\
             Primary resource trend: {trend}; player pace: {pace}\n\
             Player profile: {summary} (success rate {rate:.2})\n\
             Last player action: {last}\n\
             Recent history:\n{history}\n\n\
             Respond with JSON only: {{\"assessment\": string, \
             \"tension_level\": \"low\"|\"medium\"|\"high\", \
             \"player_struggling\": bool, \
             \"action\": \"continue\"|\"spawn_event\"|\"adjust_npc\"|\"give_hint\"|\"transition\", \
             \"details\": object}}",
            scene = request.scene_id,
            attempts = request.player.attempts_for(request.scene_id),
            elapsed = request.elapsed.as_secs_f64(),
            actor = request.actor_id,
            state = state_summary.join(", "),
            trend = self.trends.resource_trend().label(),
            pace = self.trends.action_pace().label(),
            summary = request.player.personality_summary,
            rate = request.player.success_rate(),
            last = request.last_action,
            history = history_tail.join("\n"),
        )
    }

    /// Deterministic forced-terminal check, evaluated every tick and
    /// independent of any consultation cooldown.
    pub fn should_force_game_over(
        state: &SceneState,
        profile: &SceneProfile,
        failed_actions: u32,
    ) -> Option<TerminalOutcome> {
        let primary = state.number(&profile.primary.key).unwrap_or(0.0);
        if primary <= 0.0 {
            return Some(TerminalOutcome::Failure {
                reason: format!("{} exhausted", profile.primary.key),
            });
        }
        if failed_actions >= FAILED_ACTION_CEILING {
            return Some(TerminalOutcome::Failure {
                reason: format!("{failed_actions} failed actions"),
            });
        }
        let relationship = state.number(&profile.relationship_key).unwrap_or(0.0);
        if relationship < RELATIONSHIP_COLLAPSE && profile.primary.is_critical(primary) {
            return Some(TerminalOutcome::Failure {
                reason: format!(
                    "{} collapsed while {} is critical",
                    profile.relationship_key, profile.primary.key
                ),
            });
        }
        None
    }

    /// Turn an event kind and description into state deltas plus narration.
    /// Crisis deltas are negative, help deltas positive, challenges carry
    /// no deltas at all.
    pub fn materialize_event(
        kind: EventKind,
        description: &str,
        profile: &SceneProfile,
    ) -> EventEffect {
        let magnitude = profile.event_magnitude;
        let mut deltas = HashMap::new();
        let narrative = match kind {
            EventKind::Crisis => {
                deltas.insert(profile.primary.key.clone(), -magnitude);
                deltas.insert(profile.relationship_key.clone(), -magnitude * 0.3);
                format!("Without warning, {description}.")
            }
            EventKind::Help => {
                deltas.insert(profile.primary.key.clone(), magnitude);
                deltas.insert(profile.relationship_key.clone(), magnitude * 0.3);
                format!("A stroke of luck: {description}.")
            }
            EventKind::Challenge => format!("A new obstacle: {description}."),
        };
        EventEffect { deltas, narrative }
    }

    /// Difficulty tier for the upcoming scene.
    pub fn difficulty_for(player: &PlayerProfile, scene_id: &str) -> DifficultyTier {
        DifficultyTier::for_performance(player.success_rate(), player.attempts_for(scene_id))
    }
}

/// Keyword-matched behavior instruction, echoing the raw request verbatim
/// when no keyword matches.
pub fn behavior_directive(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    for (keywords, instruction) in BEHAVIOR_TABLE {
        if keywords.iter().any(|k| lowered.contains(k)) {
            return (*instruction).to_string();
        }
    }
    raw.to_string()
}

const BEHAVIOR_TABLE: &[(&[&str], &str)] = &[
    (
        &["urgent", "hurry", "rush"],
        "Speak faster and press the player to act now.",
    ),
    (
        &["calm", "soothe", "reassure"],
        "Lower the register and reassure the player.",
    ),
    (
        &["encourage", "praise"],
        "Point out the progress the player has already made.",
    ),
    (
        &["warn", "danger"],
        "Voice concern about the immediate danger.",
    ),
    (
        &["distant", "cold", "withdraw"],
        "Pull back emotionally; shorter, flatter replies.",
    ),
];

/// Keyword-matched hint instruction with verbatim fallback.
pub fn hint_directive(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    for (keywords, instruction) in HINT_TABLE {
        if keywords.iter().any(|k| lowered.contains(k)) {
            return (*instruction).to_string();
        }
    }
    raw.to_string()
}

const HINT_TABLE: &[(&[&str], &str)] = &[
    (
        &["repair", "fix", "system"],
        "Steer attention toward the damaged systems.",
    ),
    (
        &["oxygen", "air", "breath"],
        "Mention the oxygen readout explicitly.",
    ),
    (
        &["where", "location", "find"],
        "Describe where the important object sits.",
    ),
];

fn hint_for(specificity: HintSpecificity) -> &'static str {
    match specificity {
        HintSpecificity::Gentle => "Hint obliquely at what the player has not tried yet.",
        HintSpecificity::Direct => "Name the subsystem the player should work on next.",
        HintSpecificity::Explicit => "Spell out the exact next step, plainly.",
    }
}

fn hint_type_label(specificity: HintSpecificity) -> &'static str {
    match specificity {
        HintSpecificity::Gentle => "gentle",
        HintSpecificity::Direct => "direct",
        HintSpecificity::Explicit => "explicit",
    }
}

/// Parse the model's structured decision, stripping surrounding code-fence
/// markers when present. Returns `None` on any malformation.
fn parse_directive(response: &str) -> Option<LlmDirective> {
    let body = strip_code_fences(response);
    serde_json::from_str(body).ok()
}

fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the fence line.
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use async_trait::async_trait;
    use scene_rules::ProfileLibrary;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedModel {
        responses: Mutex<VecDeque<Result<String, LlmError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(responses: impl IntoIterator<Item = Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into_iter().collect()),
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LlmError::EmptyResponse))
        }
    }

    fn quiet_state() -> SceneState {
        let mut state = SceneState::new();
        state.set("oxygen", 80.0);
        state.set("radiation", 10.0);
        state.set("emotional_bond", 40.0);
        state.set("phase", "climax");
        state
    }

    fn request<'a>(
        state: &'a SceneState,
        profile: &'a SceneProfile,
        player: &'a PlayerProfile,
        history: &'a [String],
    ) -> ConsultRequest<'a> {
        ConsultRequest {
            scene_id: "submarine_rescue",
            state,
            recent_history: history,
            player,
            actor_id: "navigator",
            last_action: "checked the sonar",
            elapsed: Duration::from_secs(30),
            idle: Duration::ZERO,
            failed_attempts: 0,
            profile,
        }
    }

    #[tokio::test]
    async fn test_malformed_response_continues() {
        let model = ScriptedModel::new([Ok("not json".to_string())]);
        let mut director = NarrativeDirector::new(model.clone() as Arc<dyn LanguageModel>);
        let library = ProfileLibrary::builtin();
        let profile = library.select("submarine").clone();
        let state = quiet_state();
        let player = PlayerProfile::default();

        let decision = director
            .consult(request(&state, &profile, &player, &[]))
            .await;
        assert!(matches!(decision, DirectorDecision::Continue { .. }));
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_model_failure_continues() {
        let model = ScriptedModel::new([Err(LlmError::Timeout)]);
        let mut director = NarrativeDirector::new(model as Arc<dyn LanguageModel>);
        let library = ProfileLibrary::builtin();
        let profile = library.select("submarine").clone();
        let state = quiet_state();
        let player = PlayerProfile::default();

        let decision = director
            .consult(request(&state, &profile, &player, &[]))
            .await;
        assert!(matches!(decision, DirectorDecision::Continue { .. }));
    }

    #[tokio::test]
    async fn test_fenced_json_is_accepted_and_arms_cooldown() {
        let response = "```json\n{\"assessment\": \"tension is flat\", \
             \"tension_level\": \"low\", \"player_struggling\": false, \
             \"action\": \"spawn_event\", \
             \"details\": {\"event_type\": \"crisis\", \
             \"event_description\": \"a pipe bursts\"}}\n```";
        let model = ScriptedModel::new([Ok(response.to_string())]);
        let mut director = NarrativeDirector::new(model.clone() as Arc<dyn LanguageModel>);
        let library = ProfileLibrary::builtin();
        let profile = library.select("submarine").clone();
        let state = quiet_state();
        let player = PlayerProfile::default();
        let history = vec!["[narrator] water drips".to_string()];

        let decision = director
            .consult(request(&state, &profile, &player, &history))
            .await;
        assert_eq!(
            decision,
            DirectorDecision::SpawnEvent {
                kind: EventKind::Crisis,
                description: "a pipe bursts".to_string(),
                reason: "model decision".to_string(),
            }
        );

        // The spawned event armed the decision cooldown: the next consults
        // return Continue without touching the model or the rules.
        let next = director
            .consult(request(&state, &profile, &player, &history))
            .await;
        assert_eq!(
            next,
            DirectorDecision::Continue {
                reason: "decision cooldown active".to_string(),
            }
        );
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_rule_engine_answers_before_model() {
        let model = ScriptedModel::new([]);
        let mut director = NarrativeDirector::new(model.clone() as Arc<dyn LanguageModel>);
        let library = ProfileLibrary::builtin();
        let profile = library.select("submarine").clone();
        let mut state = quiet_state();
        state.set("oxygen", 12.0);
        let player = PlayerProfile::default();

        let decision = director
            .consult(request(&state, &profile, &player, &[]))
            .await;
        assert!(matches!(
            decision,
            DirectorDecision::SpawnEvent {
                kind: EventKind::Crisis,
                ..
            }
        ));
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_action_fails_closed() {
        let response = "{\"assessment\": \"x\", \"tension_level\": \"high\", \
             \"player_struggling\": true, \"action\": \"summon_dragon\", \"details\": {}}";
        let model = ScriptedModel::new([Ok(response.to_string())]);
        let mut director = NarrativeDirector::new(model as Arc<dyn LanguageModel>);
        let library = ProfileLibrary::builtin();
        let profile = library.select("submarine").clone();
        let state = quiet_state();
        let player = PlayerProfile::default();

        let decision = director
            .consult(request(&state, &profile, &player, &[]))
            .await;
        assert!(matches!(decision, DirectorDecision::Continue { .. }));
    }

    #[test]
    fn test_forced_game_over() {
        let library = ProfileLibrary::builtin();
        let profile = library.select("submarine");

        let mut state = quiet_state();
        state.set("oxygen", 0.0);
        assert!(matches!(
            NarrativeDirector::should_force_game_over(&state, profile, 0),
            Some(TerminalOutcome::Failure { .. })
        ));

        let state = quiet_state();
        assert!(NarrativeDirector::should_force_game_over(&state, profile, 0).is_none());
        assert!(
            NarrativeDirector::should_force_game_over(&state, profile, FAILED_ACTION_CEILING)
                .is_some()
        );

        let mut state = quiet_state();
        state.set("oxygen", 14.0);
        state.set("emotional_bond", -30.0);
        assert!(NarrativeDirector::should_force_game_over(&state, profile, 0).is_some());

        // Relationship collapse alone is not terminal while the resource
        // holds.
        let mut state = quiet_state();
        state.set("emotional_bond", -30.0);
        assert!(NarrativeDirector::should_force_game_over(&state, profile, 0).is_none());
    }

    #[test]
    fn test_materialize_event_deltas() {
        let library = ProfileLibrary::builtin();
        let profile = library.select("submarine");

        let crisis = NarrativeDirector::materialize_event(EventKind::Crisis, "a leak", profile);
        assert_eq!(crisis.deltas.get("oxygen"), Some(&-10.0));
        assert_eq!(crisis.deltas.get("emotional_bond"), Some(&-3.0));

        let help = NarrativeDirector::materialize_event(EventKind::Help, "a spare tank", profile);
        assert_eq!(help.deltas.get("oxygen"), Some(&10.0));

        let challenge =
            NarrativeDirector::materialize_event(EventKind::Challenge, "a locked door", profile);
        assert!(challenge.deltas.is_empty());
        assert!(challenge.narrative.contains("a locked door"));
    }

    #[test]
    fn test_behavior_and_hint_tables_fall_back_verbatim() {
        assert_eq!(
            behavior_directive("be urgent about this"),
            "Speak faster and press the player to act now."
        );
        assert_eq!(
            behavior_directive("whistle a sea shanty"),
            "whistle a sea shanty"
        );
        assert_eq!(
            hint_directive("they need to fix the pump"),
            "Steer attention toward the damaged systems."
        );
        assert_eq!(hint_directive("mind the moon pool"), "mind the moon pool");
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn test_difficulty_passthrough() {
        let player = PlayerProfile {
            successes: 1,
            failures: 9,
            ..Default::default()
        };
        assert_eq!(
            NarrativeDirector::difficulty_for(&player, "submarine"),
            DifficultyTier::Easier
        );
    }
}
