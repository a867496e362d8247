//! Workflow Engine — runs a Step Definition Set against one ledger entry.
//!
//! The engine:
//! 1. Marks the task `RUNNING`
//! 2. Walks the steps strictly in definition order
//! 3. Skips steps whose condition is false for the results so far
//! 4. Builds inputs, calls the agent through the `AgentInvoker`, maps output
//! 5. Publishes every step transition to the `TaskLedger` (which persists it)
//! 6. Stops at the first failing step; completed steps are never rolled back
//!
//! `execute` never returns an error: whatever goes wrong in a run is
//! recorded on the task.

use std::sync::Arc;

use crate::error::StepError;
use crate::ledger::TaskLedger;
use crate::models::{Payload, Task, TaskStatus};
use crate::workflow::definition::{StepDefinition, WorkflowDefinition};
use crate::workflow::invoker::AgentInvoker;

/// The workflow engine.
pub struct WorkflowEngine {
    invoker: Arc<dyn AgentInvoker>,
    ledger: TaskLedger,
}

impl WorkflowEngine {
    pub fn new(invoker: Arc<dyn AgentInvoker>, ledger: TaskLedger) -> Self {
        Self { invoker, ledger }
    }

    pub fn ledger(&self) -> &TaskLedger {
        &self.ledger
    }

    /// Run `workflow` for the task `task_id` until it reaches a terminal
    /// status, and return that status. `None` only if the task is unknown.
    pub async fn execute(&self, task_id: &str, workflow: &WorkflowDefinition) -> Option<TaskStatus> {
        let task = match self.ledger.get(task_id) {
            Ok(task) => task,
            Err(e) => {
                tracing::error!(task_id, "Cannot execute workflow '{}': {}", workflow.name, e);
                return None;
            }
        };

        if task.steps.len() != workflow.steps.len() {
            let message = format!(
                "Task has {} step record(s) but workflow '{}' defines {}",
                task.steps.len(),
                workflow.name,
                workflow.steps.len()
            );
            tracing::error!(task_id, "{}", message);
            self.publish(task_id, move |t| t.abort(message)).await;
            return self.final_status(task_id);
        }

        if self.publish(task_id, Task::mark_running).await == Some(false) {
            tracing::warn!(
                task_id,
                status = %task.status,
                "Task was not PENDING when its run started; recording progress only"
            );
        }

        tracing::info!(
            task_id,
            workflow = %workflow.name,
            steps = workflow.steps.len(),
            "Workflow run started"
        );

        let params = task.params;
        let mut accumulated: Payload = task.results;

        for (index, step) in workflow.steps.iter().enumerate() {
            if !step.should_run(&accumulated) {
                tracing::debug!(task_id, step = %step.name, "Condition not met; step skipped");
                self.publish(task_id, |t| t.skip_step(index)).await;
                continue;
            }

            self.publish(task_id, |t| t.start_step(index)).await;
            tracing::debug!(
                task_id,
                step = %step.name,
                agent = %step.agent,
                action = %step.action,
                "Step started"
            );

            match self.run_step(step, &params, &accumulated).await {
                Ok(mapped) => {
                    tracing::debug!(task_id, step = %step.name, keys = mapped.len(), "Step completed");
                    for (key, value) in &mapped {
                        accumulated.insert(key.clone(), value.clone());
                    }
                    self.publish(task_id, move |t| t.complete_step(index, mapped))
                        .await;
                }
                Err(err) => {
                    tracing::warn!(task_id, step = %step.name, "Step failed: {}", err);
                    let message = err.to_string();
                    self.publish(task_id, move |t| t.fail_step(index, message))
                        .await;
                    return self.final_status(task_id);
                }
            }
        }

        self.publish(task_id, Task::finish).await;
        self.final_status(task_id)
    }

    async fn run_step(
        &self,
        step: &StepDefinition,
        params: &Payload,
        accumulated: &Payload,
    ) -> Result<Payload, StepError> {
        let inputs = step.build_inputs(params, accumulated)?;
        let raw = self
            .invoker
            .invoke(&step.agent, &step.action, inputs)
            .await?;
        step.map_output(raw)
    }

    /// Publish a mutation. `None` means nothing was published; the ledger
    /// error is logged, never propagated.
    async fn publish<R>(&self, task_id: &str, mutate: impl FnOnce(&mut Task) -> R) -> Option<R> {
        match self.ledger.update(task_id, mutate).await {
            Ok(out) => Some(out),
            Err(e) => {
                tracing::error!(task_id, "Failed to update task: {}", e);
                None
            }
        }
    }

    fn final_status(&self, task_id: &str) -> Option<TaskStatus> {
        let status = self.ledger.get(task_id).ok().map(|t| t.status);
        if let Some(status) = status {
            tracing::info!(task_id, %status, "Workflow run finished");
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StepStatus;
    use crate::workflow::invoker::HandlerRegistry;
    use serde_json::{json, Value};

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    async fn engine_with(
        registry: HandlerRegistry,
        workflow: &WorkflowDefinition,
        params: Payload,
    ) -> (WorkflowEngine, String) {
        let ledger = TaskLedger::in_memory();
        let task = Task::new(&workflow.name, workflow.step_names(), params);
        let id = task.id.clone();
        ledger.insert(task).await.unwrap();
        (WorkflowEngine::new(Arc::new(registry), ledger), id)
    }

    #[tokio::test]
    async fn test_inputs_see_params_and_prior_results() {
        let registry = HandlerRegistry::new()
            .with("coder", "generate", |inputs: Payload| async move {
                Ok::<_, StepError>(payload(json!({ "code": format!("// {}", inputs["prompt"].as_str().unwrap_or("")) })))
            })
            .with("reviewer", "review", |inputs: Payload| async move {
                Ok::<_, StepError>(payload(json!({ "approved": inputs["code"] == "// hi" })))
            });

        let workflow = WorkflowDefinition::new(
            "review",
            vec![
                StepDefinition::new("generate", "coder", "generate")
                    .with_inputs(|params, _| Ok(payload(json!({ "prompt": params["user_prompt"] }))))
                    .with_output(|raw| Ok(payload(json!({ "x": raw["code"] })))),
                StepDefinition::new("review", "reviewer", "review")
                    .with_inputs(|_, results| Ok(payload(json!({ "code": results["x"] })))),
            ],
        );

        let (engine, id) =
            engine_with(registry, &workflow, payload(json!({ "user_prompt": "hi" }))).await;
        assert_eq!(engine.execute(&id, &workflow).await, Some(TaskStatus::Completed));

        let task = engine.ledger().get(&id).unwrap();
        assert_eq!(task.results["x"], "// hi");
        assert_eq!(task.results["review"]["approved"], true);
        assert!(task.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_input_failure_fails_step_without_invoking() {
        let registry = HandlerRegistry::new().with("a", "b", |_: Payload| async move {
            Err::<Payload, _>(StepError::failure("must not be called"))
        });
        let workflow = WorkflowDefinition::new(
            "broken",
            vec![StepDefinition::new("only", "a", "b")
                .with_inputs(|_, _| Err(StepError::failure("no prompt given")))],
        );
        let (engine, id) = engine_with(registry, &workflow, Payload::new()).await;
        assert_eq!(engine.execute(&id, &workflow).await, Some(TaskStatus::Failed));

        let task = engine.ledger().get(&id).unwrap();
        assert_eq!(task.steps[0].status, StepStatus::Failed);
        assert_eq!(task.steps[0].error.as_deref(), Some("no prompt given"));
        assert_eq!(task.error.as_deref(), Some("Step 'only' failed: no prompt given"));
    }

    #[tokio::test]
    async fn test_mismatched_ledger_entry_aborts() {
        let workflow = WorkflowDefinition::new("one", vec![StepDefinition::new("a", "x", "y")]);
        let ledger = TaskLedger::in_memory();
        let task = Task::new("one", ["a", "b"], Payload::new());
        let id = task.id.clone();
        ledger.insert(task).await.unwrap();

        let engine = WorkflowEngine::new(Arc::new(HandlerRegistry::new()), ledger);
        assert_eq!(engine.execute(&id, &workflow).await, Some(TaskStatus::Failed));
        assert!(engine.execute("missing", &workflow).await.is_none());
    }
}
