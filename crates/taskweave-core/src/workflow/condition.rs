//! Declarative step conditions (the `if:` block of a workflow file).
//!
//! ```yaml
//! if:
//!   not_empty: lint_issues
//! ```
//!
//! Conditions read only the results accumulated by earlier steps. A key that
//! is absent (for instance because the step producing it was skipped) is
//! "no data": `exists`, `not_empty` and `equals` are all false for it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::Payload;
use crate::workflow::template::lookup;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// The key is present (even if `null`).
    Exists(String),
    /// The key is present and holds a non-empty string/array/object, or any
    /// other non-null value.
    NotEmpty(String),
    Equals { key: String, value: Value },
    Not(Box<Condition>),
    All(Vec<Condition>),
    Any(Vec<Condition>),
}

impl Condition {
    pub fn evaluate(&self, results: &Payload) -> bool {
        match self {
            Condition::Exists(key) => lookup(results, key).is_some(),
            Condition::NotEmpty(key) => lookup(results, key).is_some_and(is_non_empty),
            Condition::Equals { key, value } => lookup(results, key) == Some(value),
            Condition::Not(inner) => !inner.evaluate(results),
            Condition::All(conds) => conds.iter().all(|c| c.evaluate(results)),
            Condition::Any(conds) => conds.iter().any(|c| c.evaluate(results)),
        }
    }

    /// Top-level result keys the condition reads.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        self.collect_keys(&mut keys);
        keys
    }

    fn collect_keys<'a>(&'a self, keys: &mut Vec<&'a str>) {
        match self {
            Condition::Exists(key) | Condition::NotEmpty(key) | Condition::Equals { key, .. } => {
                keys.push(key.split('.').next().unwrap_or(key.as_str()))
            }
            Condition::Not(inner) => inner.collect_keys(keys),
            Condition::All(conds) | Condition::Any(conds) => {
                conds.iter().for_each(|c| c.collect_keys(keys))
            }
        }
    }
}

fn is_non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}
