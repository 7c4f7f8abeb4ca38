//! Per-session wiring of the orchestration components.
//!
//! A [`SessionContext`] owns one scene's state, director, fuzzy evaluator,
//! delivery queue, and ticker. The session is the single writer of its
//! scene state: the action handler and the tick loop both run on the
//! session, never concurrently with each other.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};
use uuid::Uuid;

use scene_rules::{ConditionParseError, ProfileLibrary, SceneProfile, SceneState, ThresholdDirection};

use crate::delivery::{DeliveryQueue, DeliverySink, Priority, ResponseItem};
use crate::director::{
    ConsultRequest, DirectorDecision, NarrativeDirector, PlayerProfile,
};
use crate::fuzzy::{FuzzyQueryEvaluator, QueryOptions};
use crate::llm::LanguageModel;
use crate::ticker::{StateTicker, TerminalOutcome};

/// Minimum gap between delivered narrator utterances.
const MIN_DELIVERY_GAP: Duration = Duration::from_millis(1500);
/// History lines retained per session.
const HISTORY_CAP: usize = 100;

/// One live narrative session.
pub struct SessionContext {
    session_id: String,
    scene_id: String,
    actor_id: String,
    profile: SceneProfile,
    state: SceneState,
    director: NarrativeDirector,
    fuzzy: FuzzyQueryEvaluator,
    queue: DeliveryQueue,
    ticker: StateTicker,
    history: Vec<String>,
    started: Instant,
    last_action_at: Instant,
    last_action: String,
    failed_attempts: u32,
    player: PlayerProfile,
    outcome: Option<TerminalOutcome>,
}

impl SessionContext {
    /// Start a session for a scene. Selects the matching profile, seeds
    /// the scene state, and compiles the profile's terminal conditions.
    pub fn new(
        scene_id: impl Into<String>,
        actor_id: impl Into<String>,
        library: &ProfileLibrary,
        player: PlayerProfile,
        model: Arc<dyn LanguageModel>,
        sink: Arc<dyn DeliverySink>,
        tick_interval: Duration,
    ) -> Result<Self, ConditionParseError> {
        let scene_id = scene_id.into();
        let profile = library.select(&scene_id).clone();
        let ticker = StateTicker::for_profile(&profile, tick_interval)?;
        let state = seed_state(&profile, &player, &scene_id);
        let session_id = Uuid::new_v4().to_string();
        info!(%session_id, %scene_id, profile = %profile.name, "session started");

        Ok(Self {
            session_id,
            scene_id,
            actor_id: actor_id.into(),
            profile,
            state,
            director: NarrativeDirector::new(Arc::clone(&model)),
            fuzzy: FuzzyQueryEvaluator::new(model),
            queue: DeliveryQueue::new(sink, MIN_DELIVERY_GAP),
            ticker,
            history: Vec::new(),
            started: Instant::now(),
            last_action_at: Instant::now(),
            last_action: String::new(),
            failed_attempts: 0,
            player,
            outcome: None,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn scene_id(&self) -> &str {
        &self.scene_id
    }

    pub fn state(&self) -> &SceneState {
        &self.state
    }

    pub fn queue(&self) -> &DeliveryQueue {
        &self.queue
    }

    pub fn outcome(&self) -> Option<&TerminalOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_over(&self) -> bool {
        self.outcome.is_some()
    }

    /// Handle one player action and consult the director about it.
    /// Successful actions advance the progress counter and clear the
    /// failure streak; failed ones extend it.
    pub async fn handle_player_action(&mut self, action_text: &str, succeeded: bool) {
        if self.is_over() {
            debug!(session = %self.session_id, "action after scene end ignored");
            return;
        }

        self.push_history(format!("[player] {action_text}"));
        self.last_action = action_text.to_string();
        self.last_action_at = Instant::now();
        self.director.record_action();

        if succeeded {
            self.failed_attempts = 0;
            if let Some(key) = self.profile.repair_key.clone() {
                self.state.apply_delta(&key, 1.0, 0.0, 100.0);
            }
        } else {
            self.failed_attempts += 1;
        }

        let decision = self
            .director
            .consult(ConsultRequest {
                scene_id: &self.scene_id,
                state: &self.state,
                recent_history: &self.history,
                player: &self.player,
                actor_id: &self.actor_id,
                last_action: action_text,
                elapsed: self.started.elapsed(),
                idle: Duration::ZERO,
                failed_attempts: self.failed_attempts,
                profile: &self.profile,
            })
            .await;
        self.apply_decision(decision);
    }

    /// Run one tick: passive drains, terminal checks, trend recording,
    /// and a director consultation with the current idle time. Returns
    /// the terminal outcome the moment the scene ends.
    pub async fn tick(&mut self) -> Option<TerminalOutcome> {
        if self.is_over() {
            return self.outcome.clone();
        }

        if let Some(outcome) = self.ticker.tick_once(&mut self.state) {
            return Some(self.finish(outcome));
        }

        if let Some(value) = self.state.number(&self.profile.primary.key) {
            self.director.record_reading(value);
        }

        if let Some(outcome) = NarrativeDirector::should_force_game_over(
            &self.state,
            &self.profile,
            self.failed_attempts,
        ) {
            return Some(self.finish(outcome));
        }

        let decision = self
            .director
            .consult(ConsultRequest {
                scene_id: &self.scene_id,
                state: &self.state,
                recent_history: &self.history,
                player: &self.player,
                actor_id: &self.actor_id,
                last_action: &self.last_action,
                elapsed: self.started.elapsed(),
                idle: self.last_action_at.elapsed(),
                failed_attempts: self.failed_attempts,
                profile: &self.profile,
            })
            .await;
        self.apply_decision(decision);
        None
    }

    /// Drive the tick loop until the scene ends.
    pub async fn run(&mut self) -> TerminalOutcome {
        let mut interval = tokio::time::interval(self.ticker.interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Some(outcome) = self.tick().await {
                return outcome;
            }
        }
    }

    /// Ask a natural-language question about what has happened so far in
    /// this session, optionally latching a true answer.
    pub async fn fuzzy_check(&mut self, query: &str, latch: bool) -> bool {
        let transcript = self.history.join("\n");
        let session_id = self.session_id.clone();
        self.fuzzy
            .evaluate(
                &transcript,
                query,
                QueryOptions {
                    latch,
                    context: &self.scene_id,
                    session_id: &session_id,
                },
            )
            .await
    }

    fn apply_decision(&mut self, decision: DirectorDecision) {
        match decision {
            DirectorDecision::Continue { reason } => {
                debug!(session = %self.session_id, %reason, "continuing");
            }
            DirectorDecision::SpawnEvent {
                kind,
                description,
                reason,
            } => {
                let effect = NarrativeDirector::materialize_event(kind, &description, &self.profile);
                self.state.apply_deltas(&effect.deltas);
                debug!(session = %self.session_id, ?kind, %reason, "event spawned");
                self.push_history(format!("[narrator] {}", effect.narrative));
                self.speak(effect.narrative, Priority::Urgent, true, true);
            }
            DirectorDecision::AdjustNpc {
                behavior_change,
                reason,
            } => {
                // Steers the actor's prompt; nothing is spoken directly.
                debug!(session = %self.session_id, %reason, "actor behavior adjusted");
                self.push_history(format!("[direction] {behavior_change}"));
            }
            DirectorDecision::GiveHint {
                hint_type,
                content,
                reason,
            } => {
                debug!(session = %self.session_id, %hint_type, %reason, "hint offered");
                self.push_history(format!("[narrator] {content}"));
                self.speak(content, Priority::Normal, false, true);
            }
            DirectorDecision::Transition { next_scene, reason } => {
                debug!(session = %self.session_id, %next_scene, %reason, "phase transition");
                self.state.set("phase", next_scene.clone());
                self.push_history(format!("[narrator] The scene shifts: {next_scene}."));
                self.speak(
                    format!("The scene shifts: {next_scene}."),
                    Priority::Normal,
                    false,
                    false,
                );
            }
        }
    }

    fn finish(&mut self, outcome: TerminalOutcome) -> TerminalOutcome {
        info!(session = %self.session_id, ?outcome, "scene ended");
        let closing = match &outcome {
            TerminalOutcome::Success { .. } => "The scene resolves. You made it through.",
            TerminalOutcome::Failure { .. } => "The scene goes dark. This attempt is over.",
        };
        self.speak(closing.to_string(), Priority::Critical, true, false);
        self.fuzzy.clear_session(&self.session_id);
        self.outcome = Some(outcome.clone());
        outcome
    }

    fn speak(&mut self, content: String, priority: Priority, supersede: bool, cancellable: bool) {
        let mut item = ResponseItem::new(content, priority, self.queue.next_sequence_id());
        if !cancellable {
            item = item.not_cancellable();
        }
        self.queue.enqueue(item, supersede);
    }

    fn push_history(&mut self, line: String) {
        self.history.push(line);
        if self.history.len() > HISTORY_CAP {
            let excess = self.history.len() - HISTORY_CAP;
            self.history.drain(..excess);
        }
    }
}

/// Seed the scene state from the profile, applying the player's
/// difficulty tier to the primary resource's starting level.
fn seed_state(profile: &SceneProfile, player: &PlayerProfile, scene_id: &str) -> SceneState {
    let tier = NarrativeDirector::difficulty_for(player, scene_id);
    let mut state = SceneState::new();
    let primary_start = (100.0 + tier.starting_resource_bonus()).clamp(0.0, 100.0);
    state.set(profile.primary.key.clone(), primary_start);

    if let Some(secondary) = &profile.secondary {
        let start = match secondary.direction {
            ThresholdDirection::Depleting => 100.0,
            ThresholdDirection::Accumulating => 0.0,
        };
        state.set(secondary.key.clone(), start);
    }
    state.set(profile.relationship_key.clone(), 0.0);
    if let Some(repair_key) = &profile.repair_key {
        state.set(repair_key.clone(), 0.0);
    }
    let phase = profile
        .phases
        .first()
        .map(|p| p.phase.clone())
        .unwrap_or_else(|| "main".to_string());
    state.set("phase", phase);
    state
}
