//! `taskweave task` — inspect and cancel tasks in the ledger.

use taskweave_core::TaskRegistry;

use super::{ensure_persisted, print_json, truncate};

pub fn list(registry: &TaskRegistry, all: bool) -> Result<(), String> {
    let tasks = if all {
        registry.history()
    } else {
        registry.list()
    }
    .map_err(|e| e.to_string())?;

    if tasks.is_empty() {
        println!("No {} tasks.", if all { "recorded" } else { "active" });
        return Ok(());
    }

    println!(
        "{:<36}  {:<16}  {:<9}  {:>4}  {:<16}  {}",
        "ID", "WORKFLOW", "STATUS", "%", "STEP", "STARTED"
    );
    for task in tasks {
        println!(
            "{:<36}  {:<16}  {:<9}  {:>4}  {:<16}  {}",
            task.id,
            truncate(&task.workflow_name, 16),
            task.status.as_str(),
            task.progress,
            truncate(task.current_step.as_deref().unwrap_or("-"), 16),
            task.started_at
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

pub fn status(registry: &TaskRegistry, task_id: &str) -> Result<(), String> {
    let report = registry.get_status(task_id).map_err(|e| e.to_string())?;
    print_json(&report);
    Ok(())
}

/// Full ledger record, including params and accumulated results.
pub fn show(registry: &TaskRegistry, task_id: &str) -> Result<(), String> {
    let task = registry.get_task(task_id).map_err(|e| e.to_string())?;
    print_json(&task);
    Ok(())
}

pub fn artifacts(registry: &TaskRegistry, task_id: &str) -> Result<(), String> {
    let artifacts = registry.get_artifacts(task_id).map_err(|e| e.to_string())?;
    print_json(&artifacts);
    Ok(())
}

pub async fn cancel(registry: &TaskRegistry, task_id: &str) -> Result<(), String> {
    registry.cancel(task_id).await.map_err(|e| e.to_string())?;
    println!("Task {} cancelled", task_id);
    ensure_persisted(registry)
}
