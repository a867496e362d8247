//! Integration tests for the taskweave-cli commands.
//!
//! These tests exercise the same code paths as the binary, with the ledger
//! and workflow directory in a temp dir for isolation.

use std::path::Path;

use taskweave_cli::commands;
use taskweave_core::{Settings, TaskRegistry, TaskStatus};

const ECHO_WORKFLOW: &str = r#"
name: "echo"
description: "Echo the params back"
steps:
  - name: "say"
    agent: "builtin"
    action: "echo"
    inputs:
      message: "${params.message}"
    output:
      message: /message
"#;

const BROKEN_WORKFLOW: &str = r#"
name: "broken"
steps:
  - name: "call"
    agent: "nobody"
    action: "nothing"
"#;

fn settings_in(dir: &Path) -> Settings {
    let workflows = dir.join("workflows");
    std::fs::create_dir_all(&workflows).expect("Failed to create workflow dir");
    std::fs::write(workflows.join("echo.yaml"), ECHO_WORKFLOW).expect("Failed to write workflow");
    std::fs::write(workflows.join("broken.yaml"), BROKEN_WORKFLOW).expect("Failed to write workflow");
    Settings {
        ledger_path: dir.join("tasks.json"),
        workflow_dirs: vec![workflows],
    }
}

fn registry(settings: &Settings) -> TaskRegistry {
    commands::init_registry(settings).expect("Failed to init registry")
}

#[tokio::test]
async fn test_workflow_run_persists_completed_task() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_in(dir.path());

    {
        let registry = registry(&settings);
        assert_eq!(registry.catalog().names(), vec!["broken", "echo"]);
        let params = commands::parse_params(&["message=hi".to_string()]).unwrap();
        commands::workflow::run(&registry, "echo", params, false)
            .await
            .expect("echo workflow should complete");
    }

    // A fresh process sees the same ledger.
    let registry = registry(&settings);
    let history = registry.history().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, TaskStatus::Completed);

    let id = history[0].id.clone();
    assert_eq!(registry.get_artifacts(&id).unwrap()["message"], "hi");
    assert!(commands::task::status(&registry, &id).is_ok());
    assert!(commands::task::show(&registry, &id).is_ok());
    assert!(commands::task::artifacts(&registry, &id).is_ok());
    assert!(commands::task::list(&registry, true).is_ok());
}

#[tokio::test]
async fn test_failed_run_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(&settings_in(dir.path()));

    let err = commands::workflow::run(&registry, "broken", Default::default(), false)
        .await
        .unwrap_err();
    assert!(err.contains("Unknown action 'nothing' for agent 'nobody'"), "{}", err);

    let id = registry.history().unwrap()[0].id.clone();
    let err = commands::task::artifacts(&registry, &id).unwrap_err();
    assert!(err.contains("not completed"), "{}", err);
    let err = commands::task::cancel(&registry, &id).await.unwrap_err();
    assert!(err.contains("cannot be changed"), "{}", err);
}

#[tokio::test]
async fn test_unknown_workflow_and_task() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(&settings_in(dir.path()));

    let err = commands::workflow::run(&registry, "nope", Default::default(), true)
        .await
        .unwrap_err();
    assert_eq!(err, "Unknown workflow: nope");
    assert_eq!(
        commands::task::status(&registry, "missing").unwrap_err(),
        "Task not found: missing"
    );
    assert!(registry.history().unwrap().is_empty());
}

#[tokio::test]
async fn test_unsaved_ledger_fails_the_command() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_in(dir.path());
    let registry = registry(&settings);

    // A non-empty directory where the ledger file goes makes writes fail.
    std::fs::create_dir_all(settings.ledger_path.join("blocker")).unwrap();

    let params = commands::parse_params(&["message=hi".to_string()]).unwrap();
    let err = commands::workflow::run(&registry, "echo", params, false)
        .await
        .unwrap_err();
    assert!(err.starts_with("Task ledger was not saved"), "{}", err);

    // The run itself still completed in memory.
    let history = registry.history().unwrap();
    assert_eq!(history[0].status, TaskStatus::Completed);
}

#[test]
fn test_validate_workflow_files() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.yaml");
    std::fs::write(&good, ECHO_WORKFLOW).unwrap();
    assert!(commands::workflow::validate(&good).is_ok());

    let bad = dir.path().join("bad.yaml");
    std::fs::write(
        &bad,
        "name: bad\nsteps:\n  - { name: a, agent: x, action: y, inputs: { v: \"${results.later}\" } }\n",
    )
    .unwrap();
    let err = commands::workflow::validate(&bad).unwrap_err();
    assert!(err.contains("later"), "{}", err);

    assert!(commands::workflow::validate(&dir.path().join("missing.yaml")).is_err());
}

#[test]
fn test_bundled_workflows_are_valid() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../workflows");
    for name in ["hello.yaml", "disk-usage.yaml"] {
        let path = dir.join(name);
        assert!(
            commands::workflow::validate(&path).is_ok(),
            "{} should validate",
            path.display()
        );
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_hello_workflow_runs_shell_agent() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        ledger_path: dir.path().join("tasks.json"),
        workflow_dirs: vec![Path::new(env!("CARGO_MANIFEST_DIR")).join("../../workflows")],
    };
    let registry = registry(&settings);

    let params = commands::parse_params(&["who=world".to_string()]).unwrap();
    let id = registry.start("hello", params).await.unwrap();
    assert_eq!(registry.wait(&id).await.unwrap(), TaskStatus::Completed);

    let artifacts = registry.get_artifacts(&id).unwrap();
    assert_eq!(artifacts["greeting"], "Hello, world!");
    assert_eq!(artifacts["printed"], "Hello, world!\n");
}
