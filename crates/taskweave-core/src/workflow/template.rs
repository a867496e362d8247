//! `${...}` placeholder resolution for declarative step inputs.
//!
//! Supported placeholders:
//! - `${params.<key>}` — the caller-supplied task params
//! - `${results.<key>}` — results accumulated by earlier steps
//! - `${env.<VAR>}` / `${env.<VAR>:-default}` — process environment
//!
//! Keys may be dotted paths into nested objects/arrays
//! (`${results.generate.files.0}`). A string made of exactly one placeholder
//! resolves to the referenced JSON value itself; anything else is text
//! interpolation.
//!
//! A placeholder ends at the first `}`, so an env default cannot contain
//! one: `${env.X:-a}b}` falls back to `a` and leaves `b}` as literal text.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

use crate::error::StepError;
use crate::models::Payload;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{\s*(params|results|env)\.([^}]+?)\s*\}")
            .expect("placeholder pattern is valid")
    })
}

/// What placeholders resolve against.
#[derive(Debug, Clone, Copy)]
pub struct TemplateScope<'a> {
    pub params: &'a Payload,
    pub results: &'a Payload,
}

impl<'a> TemplateScope<'a> {
    pub fn new(params: &'a Payload, results: &'a Payload) -> Self {
        Self { params, results }
    }

    fn value(&self, namespace: &str, key: &str) -> Result<Value, StepError> {
        match namespace {
            "params" => lookup(self.params, key)
                .cloned()
                .ok_or_else(|| StepError::failure(format!("Missing parameter '{}'", key))),
            "results" => lookup(self.results, key)
                .cloned()
                .ok_or_else(|| StepError::failure(format!("Missing result '{}'", key))),
            _ => env_value(key),
        }
    }
}

fn env_value(expr: &str) -> Result<Value, StepError> {
    let (name, default) = match expr.find(":-") {
        Some(idx) => (&expr[..idx], Some(&expr[idx + 2..])),
        None => (expr, None),
    };
    match (std::env::var(name), default) {
        (Ok(v), _) => Ok(Value::String(v)),
        (Err(_), Some(d)) => Ok(Value::String(d.to_string())),
        (Err(_), None) => Err(StepError::failure(format!(
            "Environment variable '{}' is not set",
            name
        ))),
    }
}

/// Follow a dotted path through `root`. `None` means "no data".
pub fn lookup<'v>(root: &'v Payload, path: &str) -> Option<&'v Value> {
    let mut segments = path.split('.');
    let mut current = root.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Resolve every placeholder in `template`, recursing into arrays and objects.
pub fn resolve(template: &Value, scope: &TemplateScope<'_>) -> Result<Value, StepError> {
    match template {
        Value::String(s) => resolve_str(s, scope),
        Value::Array(items) => items
            .iter()
            .map(|item| resolve(item, scope))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                out.insert(key.clone(), resolve(value, scope)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn resolve_str(s: &str, scope: &TemplateScope<'_>) -> Result<Value, StepError> {
    let re = placeholder_re();

    if let Some(m) = re.find(s) {
        if m.start() == 0 && m.end() == s.len() {
            if let Some(caps) = re.captures(s) {
                return scope.value(&caps[1], &caps[2]);
            }
        }
    }

    let mut failure = None;
    let text = re.replace_all(s, |caps: &Captures| match scope.value(&caps[1], &caps[2]) {
        Ok(value) => to_text(&value),
        Err(e) => {
            failure.get_or_insert(e);
            String::new()
        }
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(Value::String(text.into_owned())),
    }
}

fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Top-level result keys referenced by `${results.<key>}` placeholders.
pub fn referenced_result_keys(template: &Value) -> Vec<String> {
    let mut keys = Vec::new();
    collect_result_keys(template, &mut keys);
    keys
}

fn collect_result_keys(template: &Value, keys: &mut Vec<String>) {
    match template {
        Value::String(s) => {
            for caps in placeholder_re().captures_iter(s) {
                if &caps[1] == "results" {
                    let key = caps[2].split('.').next().unwrap_or_default().to_string();
                    if !keys.contains(&key) {
                        keys.push(key);
                    }
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_result_keys(v, keys)),
        Value::Object(map) => map.values().for_each(|v| collect_result_keys(v, keys)),
        _ => {}
    }
}
