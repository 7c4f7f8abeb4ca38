//! Scene state management - the mapping every other component reads.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A scalar value stored in the scene state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl StateValue {
    /// Numeric view of the value, if it has one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            StateValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Text view of the value, if it has one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            StateValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for StateValue {
    fn from(value: f64) -> Self {
        StateValue::Number(value)
    }
}

impl From<i64> for StateValue {
    fn from(value: i64) -> Self {
        StateValue::Number(value as f64)
    }
}

impl From<i32> for StateValue {
    fn from(value: i32) -> Self {
        StateValue::Number(f64::from(value))
    }
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        StateValue::Bool(value)
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        StateValue::Text(value.to_string())
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        StateValue::Text(value)
    }
}

/// The scene's state mapping: string keys to small scalar values.
///
/// Owned by the session. Mutated only by the tick loop and the action
/// handler (single-writer, enforced by scheduling); read by conditions,
/// the rule engine, and the director.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SceneState {
    values: HashMap<String, StateValue>,
}

impl SceneState {
    /// Create a new empty scene state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the raw value for a key.
    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.values.get(key)
    }

    /// Get the numeric value for a key. Missing or non-numeric keys
    /// read as `None`, never panic.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(StateValue::as_number)
    }

    /// Get the text value for a key.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(StateValue::as_text)
    }

    /// Check whether a key exists.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Set a value, replacing any previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<StateValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Add `delta` to a numeric key, clamped to `[min, max]`.
    /// A missing key is treated as starting from zero.
    pub fn apply_delta(&mut self, key: &str, delta: f64, min: f64, max: f64) {
        let current = self.number(key).unwrap_or(0.0);
        let next = (current + delta).clamp(min, max);
        self.values.insert(key.to_string(), StateValue::Number(next));
    }

    /// Apply a batch of numeric deltas, as produced by event
    /// materialization. Values are clamped to `[-100, 100]` so resource
    /// percentages cannot run away while relationship scores may still
    /// go negative.
    pub fn apply_deltas(&mut self, deltas: &HashMap<String, f64>) {
        for (key, delta) in deltas {
            self.apply_delta(key, *delta, -100.0, 100.0);
        }
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &StateValue)> {
        self.values.iter()
    }

    /// Number of entries in the mapping.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<StateValue>> FromIterator<(K, V)> for SceneState {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_access() {
        let mut state = SceneState::new();
        state.set("oxygen", 85.0);
        state.set("phase", "exploration");

        assert_eq!(state.number("oxygen"), Some(85.0));
        assert_eq!(state.number("phase"), None);
        assert_eq!(state.number("missing"), None);
        assert_eq!(state.text("phase"), Some("exploration"));
    }

    #[test]
    fn test_apply_delta_clamps() {
        let mut state = SceneState::new();
        state.set("oxygen", 95.0);

        state.apply_delta("oxygen", 20.0, 0.0, 100.0);
        assert_eq!(state.number("oxygen"), Some(100.0));

        state.apply_delta("oxygen", -150.0, 0.0, 100.0);
        assert_eq!(state.number("oxygen"), Some(0.0));
    }

    #[test]
    fn test_apply_deltas_allows_negative_relationship() {
        let mut state = SceneState::new();
        state.set("trust", 10.0);

        let deltas = HashMap::from([("trust".to_string(), -40.0)]);
        state.apply_deltas(&deltas);

        assert_eq!(state.number("trust"), Some(-30.0));
    }

    #[test]
    fn test_from_iter() {
        let state: SceneState = [("oxygen", 50.0), ("radiation", 10.0)].into_iter().collect();
        assert_eq!(state.len(), 2);
        assert!(state.contains("radiation"));
    }
}
