//! Puzzle validation.
//!
//! Pure functions from a puzzle body and the raw submitted answers to a
//! verdict. Answers that do not have the shape the puzzle type expects are
//! simply wrong; only a puzzle type we have no judge for is an error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::{MatchingSolution, Puzzle, PuzzleBody};
use crate::error::{Result, SageError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Verdict {
    pub correct: bool,
}

impl Verdict {
    pub fn correct() -> Self {
        Self { correct: true }
    }

    pub fn incorrect() -> Self {
        Self { correct: false }
    }

    /// Points earned for this verdict on a puzzle worth `points`
    pub fn score(&self, points: u32) -> u32 {
        if self.correct {
            points
        } else {
            0
        }
    }
}

/// Judge a submission against the puzzle's hidden solution
pub fn validate(body: &PuzzleBody, answers: &Value) -> Result<Verdict> {
    match body {
        PuzzleBody::Matching { solution, .. } => Ok(validate_matching(solution, answers)),
        PuzzleBody::Timeline { solution, .. } => Ok(validate_timeline(solution, answers)),
        other => Err(SageError::ValidationUnsupported(other.puzzle_type())),
    }
}

pub fn validate_puzzle(puzzle: &Puzzle, answers: &Value) -> Result<Verdict> {
    validate(&puzzle.body, answers)
}

/// Same keys, same values, order irrelevant
pub fn validate_matching(solution: &MatchingSolution, answers: &Value) -> Verdict {
    match normalize_pairs(answers) {
        Some(submitted) if submitted == solution.0 => Verdict::correct(),
        _ => Verdict::incorrect(),
    }
}

/// Exact element-by-element sequence match
pub fn validate_timeline(solution: &[String], answers: &Value) -> Verdict {
    let Some(items) = answers.as_array() else {
        return Verdict::incorrect();
    };
    if items.len() != solution.len() {
        return Verdict::incorrect();
    }
    let in_order = items
        .iter()
        .zip(solution)
        .all(|(item, expected)| item.as_str() == Some(expected.as_str()));
    if in_order {
        Verdict::correct()
    } else {
        Verdict::incorrect()
    }
}

/// Numbers compare by value: `1` and `1.0` are the same answer.
fn canonical(value: &Value) -> Value {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Value::from(f as i64),
            _ => value.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), canonical(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Flatten a term mapping into a map.
///
/// Accepts `{"A": 1, "B": 2}` or `[{"A": 1}, {"B": 2}]`. Returns `None` for any
/// other shape, for list entries that are not single-entry objects, and for a
/// key that appears twice in a list. Numeric values are canonicalized.
pub fn normalize_pairs(value: &Value) -> Option<BTreeMap<String, Value>> {
    match value {
        Value::Object(map) => Some(
            map.iter()
                .map(|(k, v)| (k.clone(), canonical(v)))
                .collect(),
        ),
        Value::Array(items) => {
            let mut pairs = BTreeMap::new();
            for item in items {
                let obj = item.as_object()?;
                if obj.len() != 1 {
                    return None;
                }
                let (key, val) = obj.iter().next()?;
                if pairs.insert(key.clone(), canonical(val)).is_some() {
                    return None;
                }
            }
            Some(pairs)
        }
        _ => None,
    }
}
