//! `taskweave workflow` — list, validate and run workflows.

use std::path::Path;

use taskweave_core::workflow::WorkflowFile;
use taskweave_core::{Payload, TaskRegistry, TaskStatus};

use super::{ensure_persisted, print_json, truncate};

/// List the workflows in the catalog.
pub fn list(registry: &TaskRegistry) -> Result<(), String> {
    let catalog = registry.catalog();
    if catalog.is_empty() {
        println!("No workflows found. Add *.yaml files to a workflow directory.");
        return Ok(());
    }

    println!("┌──────────────────────┬───────┬──────────────────────────────────────────┐");
    println!("│ Name                 │ Steps │ Description                              │");
    println!("├──────────────────────┼───────┼──────────────────────────────────────────┤");
    for name in catalog.names() {
        let Some(workflow) = catalog.get(&name) else {
            continue;
        };
        println!(
            "│ {:<20} │ {:>5} │ {:<40} │",
            truncate(&workflow.name, 20),
            workflow.steps.len(),
            truncate(workflow.description.as_deref().unwrap_or(""), 40)
        );
    }
    println!("└──────────────────────┴───────┴──────────────────────────────────────────┘");
    Ok(())
}

/// Validate a workflow YAML file without executing it.
pub fn validate(file: &Path) -> Result<(), String> {
    let workflow = WorkflowFile::from_file(file).map_err(|e| e.to_string())?;
    let summary: Vec<(String, String, bool)> = workflow
        .steps
        .iter()
        .map(|s| (s.name.clone(), format!("{}.{}", s.agent, s.action), s.condition.is_some()))
        .collect();
    let name = workflow.name.clone();
    let version = workflow.version.clone();
    workflow.into_definition().map_err(|e| e.to_string())?;

    println!("✅ Workflow '{}' is valid", name);
    println!("   Version: {}", version);
    println!("   Steps: {}", summary.len());
    for (i, (step, binding, conditional)) in summary.iter().enumerate() {
        println!(
            "   {}. {} ({}){}",
            i + 1,
            step,
            binding,
            if *conditional { " [conditional]" } else { "" }
        );
    }
    Ok(())
}

/// Start a workflow and wait for it to finish.
///
/// With `detach`, the task id is printed as soon as the task is recorded and
/// the final report is not printed. The process still stays up until the run
/// ends, since the run lives in this process.
pub async fn run(
    registry: &TaskRegistry,
    name: &str,
    params: Payload,
    detach: bool,
) -> Result<(), String> {
    let task_id = registry
        .start(name, params)
        .await
        .map_err(|e| e.to_string())?;

    if detach {
        println!("{}", task_id);
    } else {
        tracing::info!("Started task {} for workflow '{}'", task_id, name);
    }

    let status = registry.wait(&task_id).await.map_err(|e| e.to_string())?;
    ensure_persisted(registry)?;
    if detach {
        return Ok(());
    }

    let report = registry.get_status(&task_id).map_err(|e| e.to_string())?;
    print_json(&report);

    match status {
        TaskStatus::Completed => Ok(()),
        _ => Err(format!(
            "Task {} {}: {}",
            task_id,
            status.as_str().to_lowercase(),
            report.error.unwrap_or(report.message)
        )),
    }
}
