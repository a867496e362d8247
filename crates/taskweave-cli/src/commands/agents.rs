//! Built-in agents available to every workflow run from the CLI.
//!
//! | agent.action   | inputs                          | result                         |
//! |----------------|---------------------------------|--------------------------------|
//! | `builtin.echo` | anything                        | the inputs, unchanged          |
//! | `shell.run`    | `command`, `args?`, `cwd?`      | `stdout`, `stderr`, `exitCode` |

use serde_json::{json, Value};
use taskweave_core::workflow::HandlerRegistry;
use taskweave_core::{Payload, StepError};

pub fn builtin_agents() -> HandlerRegistry {
    HandlerRegistry::new()
        .with("builtin", "echo", echo)
        .with("shell", "run", shell_run)
}

async fn echo(inputs: Payload) -> Result<Payload, StepError> {
    Ok(inputs)
}

/// Run a program (no shell) and capture its output. A non-zero exit status
/// fails the step.
async fn shell_run(inputs: Payload) -> Result<Payload, StepError> {
    let command = inputs
        .get("command")
        .and_then(Value::as_str)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| StepError::failure("shell.run requires a 'command' string"))?;

    let args = match inputs.get("args") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().map(arg_to_string).collect(),
        Some(other) => vec![arg_to_string(other)],
    };

    let mut cmd = tokio::process::Command::new(command);
    cmd.args(&args).kill_on_drop(true);
    if let Some(cwd) = inputs.get("cwd").and_then(Value::as_str) {
        cmd.current_dir(cwd);
    }

    tracing::debug!("[shell.run] {} {:?}", command, args);
    let output = cmd
        .output()
        .await
        .map_err(|e| StepError::failure(format!("Failed to run '{}': {}", command, e)))?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let exit_code = output.status.code();

    if !output.status.success() {
        let code = exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        return Err(StepError::failure(format!(
            "Command '{}' exited with {}: {}",
            command,
            code,
            stderr.trim()
        )));
    }

    let mut result = Payload::new();
    result.insert("stdout".to_string(), Value::String(stdout));
    result.insert("stderr".to_string(), Value::String(stderr));
    result.insert("exitCode".to_string(), json!(exit_code));
    Ok(result)
}

fn arg_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
