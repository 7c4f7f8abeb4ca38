//! Safe boolean conditions over the scene state.
//!
//! A [`Condition`] is an immutable, composable predicate of the
//! [`SceneState`](crate::state::SceneState). Conditions are built either
//! programmatically through the combinator functions in this module or by
//! parsing a restricted expression string (see [`parser`]). Evaluation is
//! total: a missing or non-numeric key makes a comparison false and an
//! existence check false, never an error.

mod parser;

pub use parser::{parse, ConditionParseError};

use serde::{Deserialize, Serialize};

use crate::state::SceneState;

/// Comparison operators allowed in conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    fn apply(self, left: f64, right: f64) -> bool {
        match self {
            CompareOp::Eq => left == right,
            CompareOp::Ne => left != right,
            CompareOp::Gt => left > right,
            CompareOp::Gte => left >= right,
            CompareOp::Lt => left < right,
            CompareOp::Lte => left <= right,
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        };
        write!(f, "{symbol}")
    }
}

/// A predicate over the scene state.
///
/// The variants mirror the small whitelist of syntax the parser accepts:
/// comparisons of a subscripted key against a numeric literal, boolean
/// combination, negation, and explicit existence checks. There is no
/// variant for calls, attribute access, or arbitrary identifiers; such
/// expressions are rejected at parse time and cannot be represented here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    /// `state['key'] <op> value`
    Compare {
        key: String,
        op: CompareOp,
        value: f64,
    },
    /// Every sub-condition holds (`and`).
    All(Vec<Condition>),
    /// At least one sub-condition holds (`or`).
    Any(Vec<Condition>),
    /// The sub-condition does not hold (`not`).
    Not(Box<Condition>),
    /// `'key' in state`
    Exists(String),
    /// `low <= state['key'] <= high`, inclusive on both ends.
    Between { key: String, low: f64, high: f64 },
}

impl Condition {
    /// Evaluate against a scene state. Never panics; missing keys make
    /// comparisons and `Between` false, and `Exists` false.
    pub fn evaluate(&self, state: &SceneState) -> bool {
        match self {
            Condition::Compare { key, op, value } => match state.number(key) {
                Some(current) => op.apply(current, *value),
                None => false,
            },
            Condition::All(parts) => parts.iter().all(|c| c.evaluate(state)),
            Condition::Any(parts) => parts.iter().any(|c| c.evaluate(state)),
            Condition::Not(inner) => !inner.evaluate(state),
            Condition::Exists(key) => state.contains(key),
            Condition::Between { key, low, high } => match state.number(key) {
                Some(current) => *low <= current && current <= *high,
                None => false,
            },
        }
    }
}

/// `state[key] == value`
pub fn eq(key: impl Into<String>, value: f64) -> Condition {
    Condition::Compare {
        key: key.into(),
        op: CompareOp::Eq,
        value,
    }
}

/// `state[key] != value`
pub fn ne(key: impl Into<String>, value: f64) -> Condition {
    Condition::Compare {
        key: key.into(),
        op: CompareOp::Ne,
        value,
    }
}

/// `state[key] > value`
pub fn gt(key: impl Into<String>, value: f64) -> Condition {
    Condition::Compare {
        key: key.into(),
        op: CompareOp::Gt,
        value,
    }
}

/// `state[key] >= value`
pub fn gte(key: impl Into<String>, value: f64) -> Condition {
    Condition::Compare {
        key: key.into(),
        op: CompareOp::Gte,
        value,
    }
}

/// `state[key] < value`
pub fn lt(key: impl Into<String>, value: f64) -> Condition {
    Condition::Compare {
        key: key.into(),
        op: CompareOp::Lt,
        value,
    }
}

/// `state[key] <= value`
pub fn lte(key: impl Into<String>, value: f64) -> Condition {
    Condition::Compare {
        key: key.into(),
        op: CompareOp::Lte,
        value,
    }
}

/// Both conditions hold. Commutative in truth value.
pub fn and_(a: Condition, b: Condition) -> Condition {
    Condition::All(vec![a, b])
}

/// Either condition holds. Commutative in truth value.
pub fn or_(a: Condition, b: Condition) -> Condition {
    Condition::Any(vec![a, b])
}

/// The condition does not hold.
pub fn not_(inner: Condition) -> Condition {
    Condition::Not(Box::new(inner))
}

/// The key is present in the state, regardless of its value.
pub fn exists(key: impl Into<String>) -> Condition {
    Condition::Exists(key.into())
}

/// `low <= state[key] <= high`
pub fn between(key: impl Into<String>, low: f64, high: f64) -> Condition {
    Condition::Between {
        key: key.into(),
        low,
        high,
    }
}
