//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and drives the
//! taskweave-core domain logic through a `TaskRegistry`.

pub mod agents;
pub mod task;
pub mod workflow;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use taskweave_core::{Payload, Settings, TaskLedger, TaskRegistry};

/// Open the ledger, load the workflow catalog and register the built-in
/// agents.
pub fn init_registry(settings: &Settings) -> Result<TaskRegistry, String> {
    let ledger = TaskLedger::open(&settings.ledger_path).map_err(|e| {
        format!(
            "Failed to open task ledger '{}': {}",
            settings.ledger_path.display(),
            e
        )
    })?;
    let catalog = settings.build_catalog().map_err(|e| e.to_string())?;
    tracing::debug!("Loaded {} workflow(s)", catalog.len());

    Ok(TaskRegistry::new(
        catalog,
        Arc::new(agents::builtin_agents()),
        ledger,
    ))
}

/// The ledger file is all a later invocation sees, so a failed write is an
/// error for the command even though the change took effect in memory.
pub fn ensure_persisted(registry: &TaskRegistry) -> Result<(), String> {
    match registry.ledger().persist_error() {
        Some(e) => Err(format!("Task ledger was not saved: {}", e)),
        None => Ok(()),
    }
}

/// Pretty-print a serializable value as JSON to stdout.
pub fn print_json(value: &impl Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}

/// Parse `key=value` pairs into task params. Values are read as YAML
/// scalars, so `n=3` is a number and `flag=true` a boolean; anything that
/// does not parse stays a string.
pub fn parse_params(pairs: &[String]) -> Result<Payload, String> {
    let mut params = Payload::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| format!("Invalid parameter '{}': expected key=value", pair))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("Invalid parameter '{}': empty key", pair));
        }
        let value = serde_yaml::from_str::<Value>(raw)
            .ok()
            .filter(|v| !v.is_null() || raw.trim() == "null")
            .unwrap_or_else(|| Value::String(raw.to_string()));
        params.insert(key.to_string(), value);
    }
    Ok(params)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_params() {
        let params = parse_params(&[
            "user_prompt=add a login page".to_string(),
            "retries=3".to_string(),
            "dry_run=true".to_string(),
            "empty=".to_string(),
        ])
        .unwrap();
        assert_eq!(params["user_prompt"], "add a login page");
        assert_eq!(params["retries"], 3);
        assert_eq!(params["dry_run"], true);
        assert_eq!(params["empty"], json!(""));

        assert!(parse_params(&["novalue".to_string()]).is_err());
        assert!(parse_params(&["=x".to_string()]).is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a-long-workflow-name", 8), "a-long-…");
    }
}
