//! Temporal trend tracking for director context.
//!
//! Bounded sliding windows of recent resource readings and player action
//! timestamps, reset at scene start, consumed as categorical labels in the
//! director's context text.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Categorical label for the primary resource's recent movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceTrend {
    Improving,
    Stable,
    Declining,
    CriticalDecline,
}

impl ResourceTrend {
    pub fn label(&self) -> &'static str {
        match self {
            ResourceTrend::Improving => "improving",
            ResourceTrend::Stable => "stable",
            ResourceTrend::Declining => "declining",
            ResourceTrend::CriticalDecline => "critical-decline",
        }
    }
}

/// How quickly the player has been acting lately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionPace {
    Brisk,
    Steady,
    Sluggish,
}

impl ActionPace {
    pub fn label(&self) -> &'static str {
        match self {
            ActionPace::Brisk => "brisk",
            ActionPace::Steady => "steady",
            ActionPace::Sluggish => "sluggish",
        }
    }
}

const READING_WINDOW: usize = 20;
const ACTION_WINDOW: usize = 30;
const PACE_HORIZON: Duration = Duration::from_secs(60);

/// Sliding windows of readings and action timestamps.
#[derive(Debug, Default)]
pub struct TemporalTrends {
    readings: VecDeque<f64>,
    actions: VecDeque<Instant>,
}

impl TemporalTrends {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything (scene/session start).
    pub fn reset(&mut self) {
        self.readings.clear();
        self.actions.clear();
    }

    /// Record one primary-resource reading (called every tick).
    pub fn record_reading(&mut self, value: f64) {
        self.readings.push_back(value);
        while self.readings.len() > READING_WINDOW {
            self.readings.pop_front();
        }
    }

    /// Record one player action (called from the action handler).
    pub fn record_action(&mut self) {
        self.actions.push_back(Instant::now());
        while self.actions.len() > ACTION_WINDOW {
            self.actions.pop_front();
        }
    }

    /// Net movement across the reading window, as a label.
    pub fn resource_trend(&self) -> ResourceTrend {
        let (Some(first), Some(last)) = (self.readings.front(), self.readings.back()) else {
            return ResourceTrend::Stable;
        };
        let delta = last - first;
        if delta <= -10.0 {
            ResourceTrend::CriticalDecline
        } else if delta <= -2.0 {
            ResourceTrend::Declining
        } else if delta >= 2.0 {
            ResourceTrend::Improving
        } else {
            ResourceTrend::Stable
        }
    }

    /// Actions within the recent horizon, as a pace label.
    pub fn action_pace(&self) -> ActionPace {
        let now = Instant::now();
        let recent = self
            .actions
            .iter()
            .filter(|at| now.duration_since(**at) <= PACE_HORIZON)
            .count();
        if recent >= 6 {
            ActionPace::Brisk
        } else if recent >= 2 {
            ActionPace::Steady
        } else {
            ActionPace::Sluggish
        }
    }
}
