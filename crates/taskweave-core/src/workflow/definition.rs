//! Step Definition Sets built in code.
//!
//! ```ignore
//! let workflow = WorkflowDefinition::new("codegen", vec![
//!     StepDefinition::new("generate", "coder", "generate")
//!         .with_inputs(|params, _| Ok(pick(params, &["user_prompt"])))
//!         .with_output(|raw| Ok(rename(raw, "code", "code"))),
//!     StepDefinition::new("fix", "coder", "fix")
//!         .when(|results| results.get("lint_issues").is_some()),
//! ]);
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{StepError, WorkflowError};
use crate::models::Payload;

/// `(params, accumulated results) → step inputs`
pub type InputFn = Arc<dyn Fn(&Payload, &Payload) -> Result<Payload, StepError> + Send + Sync>;

/// `raw agent result → named results merged into the task`
pub type OutputFn = Arc<dyn Fn(Payload) -> Result<Payload, StepError> + Send + Sync>;

/// `accumulated results → run this step?`
pub type ConditionFn = Arc<dyn Fn(&Payload) -> bool + Send + Sync>;

/// One step of a workflow, bound to exactly one agent/action pair.
#[derive(Clone)]
pub struct StepDefinition {
    pub name: String,
    pub agent: String,
    pub action: String,
    inputs: InputFn,
    output_mapping: OutputFn,
    condition: Option<ConditionFn>,
}

impl StepDefinition {
    /// A step that receives the task params as its inputs and stores its raw
    /// result under its own name.
    pub fn new(
        name: impl Into<String>,
        agent: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let key = name.clone();
        Self {
            name,
            agent: agent.into(),
            action: action.into(),
            inputs: Arc::new(|params: &Payload, _: &Payload| -> Result<Payload, StepError> {
                Ok(params.clone())
            }),
            output_mapping: Arc::new(move |raw: Payload| -> Result<Payload, StepError> {
                let mut mapped = Payload::new();
                mapped.insert(key.clone(), Value::Object(raw));
                Ok(mapped)
            }),
            condition: None,
        }
    }

    pub fn with_inputs<F>(mut self, inputs: F) -> Self
    where
        F: Fn(&Payload, &Payload) -> Result<Payload, StepError> + Send + Sync + 'static,
    {
        self.inputs = Arc::new(inputs);
        self
    }

    pub fn with_output<F>(mut self, output_mapping: F) -> Self
    where
        F: Fn(Payload) -> Result<Payload, StepError> + Send + Sync + 'static,
    {
        self.output_mapping = Arc::new(output_mapping);
        self
    }

    /// Only run the step when `condition` holds for the results so far.
    pub fn when<F>(mut self, condition: F) -> Self
    where
        F: Fn(&Payload) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }

    pub fn has_condition(&self) -> bool {
        self.condition.is_some()
    }

    pub fn should_run(&self, results: &Payload) -> bool {
        self.condition.as_ref().map_or(true, |cond| cond(results))
    }

    pub fn build_inputs(&self, params: &Payload, results: &Payload) -> Result<Payload, StepError> {
        (self.inputs)(params, results)
    }

    pub fn map_output(&self, raw: Payload) -> Result<Payload, StepError> {
        (self.output_mapping)(raw)
    }
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("name", &self.name)
            .field("agent", &self.agent)
            .field("action", &self.action)
            .field("conditional", &self.has_condition())
            .finish()
    }
}

/// A named, ordered Step Definition Set.
#[derive(Debug, Clone)]
pub struct WorkflowDefinition {
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<StepDefinition>,
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>, steps: Vec<StepDefinition>) -> Self {
        Self {
            name: name.into(),
            description: None,
            steps,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.name.as_str())
    }

    /// Structural checks: a name, at least one step, unique step names and
    /// non-empty agent/action bindings.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.name.trim().is_empty() {
            return Err(WorkflowError::Definition("workflow name is empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(WorkflowError::Definition(format!(
                "workflow '{}' has no steps",
                self.name
            )));
        }
        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.name.trim().is_empty() {
                return Err(WorkflowError::Definition(format!(
                    "workflow '{}' has a step without a name",
                    self.name
                )));
            }
            if !seen.insert(step.name.as_str()) {
                return Err(WorkflowError::Definition(format!(
                    "workflow '{}' has duplicate step '{}'",
                    self.name, step.name
                )));
            }
            if step.agent.trim().is_empty() || step.action.trim().is_empty() {
                return Err(WorkflowError::Definition(format!(
                    "step '{}' of workflow '{}' needs both an agent and an action",
                    step.name, self.name
                )));
            }
        }
        Ok(())
    }
}
