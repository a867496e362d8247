//! Task Registry — the only surface callers use to start and observe tasks.
//!
//! `start` records a `PENDING` task and returns its id straight away; the run
//! itself happens on a background tokio task. Every query reads a whole
//! published `Task` from the ledger, so answers are never half-updated.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::task::{JoinError, JoinHandle};

use crate::error::WorkflowError;
use crate::ledger::TaskLedger;
use crate::models::{Payload, Task, TaskStatus, TaskStatusReport, TaskSummary};
use crate::workflow::{AgentInvoker, WorkflowCatalog, WorkflowEngine};

pub struct TaskRegistry {
    catalog: Arc<WorkflowCatalog>,
    engine: Arc<WorkflowEngine>,
    runs: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TaskRegistry {
    pub fn new(
        catalog: WorkflowCatalog,
        invoker: Arc<dyn AgentInvoker>,
        ledger: TaskLedger,
    ) -> Self {
        Self {
            catalog: Arc::new(catalog),
            engine: Arc::new(WorkflowEngine::new(invoker, ledger)),
            runs: Mutex::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &WorkflowCatalog {
        &self.catalog
    }

    pub fn ledger(&self) -> &TaskLedger {
        self.engine.ledger()
    }

    /// Create a `PENDING` task for `workflow_name` and run it in the
    /// background. Returns the new task id without waiting for any step.
    pub async fn start(&self, workflow_name: &str, params: Payload) -> Result<String, WorkflowError> {
        let workflow = self
            .catalog
            .get(workflow_name)
            .ok_or_else(|| WorkflowError::UnknownWorkflow(workflow_name.to_string()))?;

        let task = Task::new(&workflow.name, workflow.step_names(), params);
        let task_id = task.id.clone();
        self.ledger().insert(task).await?;
        tracing::info!(task_id = %task_id, workflow = %workflow.name, "Task started");

        let engine = Arc::clone(&self.engine);
        let id = task_id.clone();
        let handle = tokio::spawn(async move {
            let run = {
                let engine = Arc::clone(&engine);
                let id = id.clone();
                tokio::spawn(async move {
                    engine.execute(&id, &workflow).await;
                })
            };
            if let Err(e) = run.await {
                if e.is_panic() {
                    let message = format!("Workflow run panicked: {}", panic_message(e));
                    tracing::error!(task_id = %id, "{}", message);
                    if let Err(e) = engine
                        .ledger()
                        .update(&id, |t| t.fail_interrupted(message))
                        .await
                    {
                        tracing::error!(task_id = %id, "Failed to record panic: {}", e);
                    }
                }
            }
        });

        match self.runs.lock() {
            Ok(mut runs) => {
                runs.retain(|_, h| !h.is_finished());
                runs.insert(task_id.clone(), handle);
            }
            Err(e) => tracing::warn!("Run table lock poisoned; run is detached: {}", e),
        }

        Ok(task_id)
    }

    /// Status, progress and step records of one task.
    pub fn get_status(&self, task_id: &str) -> Result<TaskStatusReport, WorkflowError> {
        Ok(self.ledger().get(task_id)?.status_report())
    }

    /// Accumulated results of a `COMPLETED` task.
    pub fn get_artifacts(&self, task_id: &str) -> Result<Payload, WorkflowError> {
        let task = self.ledger().get(task_id)?;
        if task.status != TaskStatus::Completed {
            return Err(WorkflowError::TaskNotCompleted {
                id: task.id,
                status: task.status,
            });
        }
        Ok(task.results)
    }

    /// Summaries of `PENDING` and `RUNNING` tasks.
    pub fn list(&self) -> Result<Vec<TaskSummary>, WorkflowError> {
        Ok(self.ledger().active()?.iter().map(Task::summary).collect())
    }

    /// Every task the ledger knows about, terminal ones included.
    pub fn history(&self) -> Result<Vec<TaskSummary>, WorkflowError> {
        Ok(self.ledger().history()?.iter().map(Task::summary).collect())
    }

    pub fn get_task(&self, task_id: &str) -> Result<Task, WorkflowError> {
        self.ledger().get(task_id)
    }

    /// Mark an active task `CANCELLED`. The in-flight run is not interrupted;
    /// its step records keep advancing but the task status stays cancelled.
    ///
    /// Succeeds once the cancellation is published, even if the ledger file
    /// could not be written (see [`TaskLedger::persist_error`]).
    pub async fn cancel(&self, task_id: &str) -> Result<(), WorkflowError> {
        self.ledger().try_update(task_id, Task::cancel).await?;
        tracing::info!(task_id, "Task cancelled");
        Ok(())
    }

    /// Wait for the background run of `task_id` (if still tracked) and
    /// return the task's status afterwards.
    pub async fn wait(&self, task_id: &str) -> Result<TaskStatus, WorkflowError> {
        let handle = self.take_runs(|id| id == task_id).pop();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(task_id, "Run supervisor ended abnormally: {}", e);
            }
        }
        Ok(self.ledger().get(task_id)?.status)
    }

    /// Wait for every tracked run to finish.
    pub async fn shutdown(&self) {
        let handles = self.take_runs(|_| true);
        if !handles.is_empty() {
            tracing::info!("Waiting for {} workflow run(s) to finish", handles.len());
        }
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!("Run supervisor ended abnormally: {}", e);
            }
        }
    }

    fn take_runs(&self, selector: impl Fn(&str) -> bool) -> Vec<JoinHandle<()>> {
        let Ok(mut runs) = self.runs.lock() else {
            return Vec::new();
        };
        let ids: Vec<String> = runs.keys().filter(|id| selector(id.as_str())).cloned().collect();
        ids.iter().filter_map(|id| runs.remove(id)).collect()
    }
}

fn panic_message(err: JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string()),
        Err(e) => e.to_string(),
    }
}
