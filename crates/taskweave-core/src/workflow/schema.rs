//! YAML schema types for workflow definitions.
//!
//! A workflow YAML defines an ordered, agent-bound step pipeline:
//!
//! ```yaml
//! name: "codegen"
//! description: "Generate, lint and fix code"
//! version: "1.0"
//!
//! steps:
//!   - name: "generate"
//!     agent: "coder"
//!     action: "generate"
//!     inputs:
//!       prompt: "${params.user_prompt}"
//!     output:
//!       code: /code
//!
//!   - name: "lint"
//!     agent: "linter"
//!     action: "lint"
//!     inputs:
//!       code: "${results.code}"
//!     output:
//!       lint_issues: /issues
//!
//!   - name: "fix"
//!     agent: "coder"
//!     action: "fix"
//!     if:
//!       not_empty: lint_issues
//!     inputs:
//!       code: "${results.code}"
//!       issues: "${results.lint_issues}"
//! ```
//!
//! `inputs` values are templates (see [`template`](crate::workflow::template)),
//! `output` maps result keys to JSON pointers into the agent's raw result
//! (an empty pointer `""` maps the whole result; `/` is the key `""`), and
//! `if` is a [`Condition`] over the results of earlier steps. Without an
//! `output` block the raw result is stored under the step's name.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StepError, WorkflowError};
use crate::models::Payload;
use crate::workflow::condition::Condition;
use crate::workflow::definition::{StepDefinition, WorkflowDefinition};
use crate::workflow::template::{self, TemplateScope};

/// Top-level workflow definition loaded from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowFile {
    /// Workflow name (the key callers pass to `start`)
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Version string
    #[serde(default = "default_version")]
    pub version: String,

    /// Ordered list of workflow steps
    pub steps: Vec<StepSpec>,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// A single step in the workflow file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    /// Step name (unique within the workflow)
    pub name: String,

    /// Logical agent the step is sent to
    pub agent: String,

    /// Action requested from the agent
    pub action: String,

    /// Input templates. Omitted: the task params are passed through.
    #[serde(default)]
    pub inputs: Option<BTreeMap<String, Value>>,

    /// Result key → JSON pointer into the raw agent result
    #[serde(default)]
    pub output: Option<BTreeMap<String, String>>,

    /// Only run the step if the condition holds for earlier results
    #[serde(default, rename = "if")]
    pub condition: Option<Condition>,
}

impl StepSpec {
    /// Result keys this step contributes to the task results.
    pub fn produced_keys(&self) -> Vec<String> {
        match &self.output {
            Some(output) => output.keys().cloned().collect(),
            None => vec![self.name.clone()],
        }
    }

    fn into_definition(self) -> StepDefinition {
        let mut step = StepDefinition::new(&self.name, &self.agent, &self.action);

        if let Some(inputs) = self.inputs {
            let templates = Value::Object(inputs.into_iter().collect());
            step = step.with_inputs(move |params, results| {
                match template::resolve(&templates, &TemplateScope::new(params, results))? {
                    Value::Object(map) => Ok(map),
                    _ => Err(StepError::failure("step inputs must resolve to an object")),
                }
            });
        }

        if let Some(output) = self.output {
            step = step.with_output(move |raw| map_output(&output, raw));
        }

        if let Some(condition) = self.condition {
            step = step.when(move |results| condition.evaluate(results));
        }

        step
    }
}

fn map_output(output: &BTreeMap<String, String>, raw: Payload) -> Result<Payload, StepError> {
    let raw = Value::Object(raw);
    let mut mapped = Payload::new();
    for (key, pointer) in output {
        let value = if pointer.is_empty() {
            raw.clone()
        } else {
            raw.pointer(pointer).cloned().ok_or_else(|| {
                StepError::failure(format!(
                    "Output '{}' not found at '{}' in agent result",
                    key, pointer
                ))
            })?
        };
        mapped.insert(key.clone(), value);
    }
    Ok(mapped)
}

impl WorkflowFile {
    /// Parse a workflow definition from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, WorkflowError> {
        serde_yaml::from_str(yaml)
            .map_err(|e| WorkflowError::Definition(format!("Failed to parse workflow YAML: {}", e)))
    }

    /// Load a workflow definition from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, WorkflowError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            WorkflowError::Definition(format!(
                "Failed to read workflow file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Check that every `${results.<key>}` reference and every condition key
    /// is produced by an earlier step, and that output pointers are valid.
    pub fn validate_references(&self) -> Result<(), WorkflowError> {
        let mut produced: HashSet<String> = HashSet::new();
        for step in &self.steps {
            if let Some(inputs) = &step.inputs {
                let templates = Value::Object(inputs.clone().into_iter().collect());
                for key in template::referenced_result_keys(&templates) {
                    if !produced.contains(&key) {
                        return Err(WorkflowError::Definition(format!(
                            "step '{}' reads result '{}' which no earlier step produces",
                            step.name, key
                        )));
                    }
                }
            }
            if let Some(condition) = &step.condition {
                for key in condition.keys() {
                    if !produced.contains(key) {
                        return Err(WorkflowError::Definition(format!(
                            "condition of step '{}' reads result '{}' which no earlier step produces",
                            step.name, key
                        )));
                    }
                }
            }
            if let Some(output) = &step.output {
                for (key, pointer) in output {
                    if !pointer.is_empty() && !pointer.starts_with('/') {
                        return Err(WorkflowError::Definition(format!(
                            "output '{}' of step '{}' must be a JSON pointer (got '{}')",
                            key, step.name, pointer
                        )));
                    }
                }
            }
            produced.extend(step.produced_keys());
        }
        Ok(())
    }

    /// Validate and build the runtime Step Definition Set.
    pub fn into_definition(self) -> Result<WorkflowDefinition, WorkflowError> {
        self.validate_references()?;
        let mut definition = WorkflowDefinition::new(
            self.name,
            self.steps.into_iter().map(StepSpec::into_definition).collect(),
        );
        if let Some(description) = self.description {
            definition = definition.with_description(description);
        }
        definition.validate()?;
        Ok(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CODEGEN: &str = r#"
name: "codegen"
description: "Generate, lint and fix"
steps:
  - name: "generate"
    agent: "coder"
    action: "generate"
    inputs:
      prompt: "${params.user_prompt}"
    output:
      code: /code
  - name: "lint"
    agent: "linter"
    action: "lint"
    inputs:
      code: "${results.code}"
    output:
      lint_issues: /issues
  - name: "fix"
    agent: "coder"
    action: "fix"
    if:
      not_empty: lint_issues
    inputs:
      code: "${results.code}"
      issues: "${results.lint_issues}"
"#;

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_parse_workflow_file() {
        let wf = WorkflowFile::from_yaml(CODEGEN).unwrap();
        assert_eq!(wf.name, "codegen");
        assert_eq!(wf.version, "1.0");
        assert_eq!(wf.steps.len(), 3);
        assert_eq!(wf.steps[1].agent, "linter");
        assert_eq!(
            wf.steps[2].condition,
            Some(Condition::NotEmpty("lint_issues".to_string()))
        );
        assert!(wf.validate_references().is_ok());
    }

    #[test]
    fn test_built_steps_resolve_templates_and_map_output() {
        let def = WorkflowFile::from_yaml(CODEGEN).unwrap().into_definition().unwrap();
        assert_eq!(def.description.as_deref(), Some("Generate, lint and fix"));

        let params = payload(json!({ "user_prompt": "hi" }));
        let inputs = def.steps[0].build_inputs(&params, &Payload::new()).unwrap();
        assert_eq!(inputs, payload(json!({ "prompt": "hi" })));

        let mapped = def.steps[1]
            .map_output(payload(json!({ "issues": [], "ok": true })))
            .unwrap();
        assert_eq!(mapped, payload(json!({ "lint_issues": [] })));

        assert!(!def.steps[2].should_run(&mapped));
        assert!(def.steps[2].should_run(&payload(json!({ "lint_issues": ["e"] }))));
    }

    #[test]
    fn test_missing_output_pointer_is_step_failure() {
        let def = WorkflowFile::from_yaml(CODEGEN).unwrap().into_definition().unwrap();
        let err = def.steps[0].map_output(Payload::new()).unwrap_err();
        assert_eq!(
            err,
            StepError::failure("Output 'code' not found at '/code' in agent result")
        );
    }

    #[test]
    fn test_forward_reference_is_rejected() {
        let yaml = r#"
name: "bad"
steps:
  - name: "a"
    agent: "x"
    action: "y"
    inputs:
      code: "${results.code}"
"#;
        let err = WorkflowFile::from_yaml(yaml).unwrap().into_definition().unwrap_err();
        assert!(err.to_string().contains("reads result 'code'"));
    }

    #[test]
    fn test_default_output_is_keyed_by_step_name() {
        let yaml = r#"
name: "plain"
steps:
  - name: "first"
    agent: "x"
    action: "y"
  - name: "second"
    agent: "x"
    action: "y"
    if:
      exists: first
    inputs:
      previous: "${results.first.value}"
"#;
        let def = WorkflowFile::from_yaml(yaml).unwrap().into_definition().unwrap();
        let mapped = def.steps[0].map_output(payload(json!({ "value": 1 }))).unwrap();
        assert_eq!(mapped, payload(json!({ "first": { "value": 1 } })));
        let inputs = def.steps[1].build_inputs(&Payload::new(), &mapped).unwrap();
        assert_eq!(inputs["previous"], 1);
    }

    #[test]
    fn test_only_empty_pointer_maps_whole_result() {
        let yaml = r#"
name: "pointers"
steps:
  - name: "only"
    agent: "x"
    action: "y"
    output:
      whole: ""
      blank_key: "/"
"#;
        let def = WorkflowFile::from_yaml(yaml).unwrap().into_definition().unwrap();
        let mapped = def.steps[0]
            .map_output(payload(json!({ "": 7, "other": 1 })))
            .unwrap();
        assert_eq!(mapped["whole"], json!({ "": 7, "other": 1 }));
        assert_eq!(mapped["blank_key"], 7);

        let err = def.steps[0]
            .map_output(payload(json!({ "other": 1 })))
            .unwrap_err();
        assert_eq!(
            err,
            StepError::failure("Output 'blank_key' not found at '/' in agent result")
        );
    }

    #[test]
    fn test_duplicate_step_names_are_rejected() {
        let yaml = r#"
name: "dup"
steps:
  - { name: "a", agent: "x", action: "y" }
  - { name: "a", agent: "x", action: "z" }
"#;
        assert!(WorkflowFile::from_yaml(yaml).unwrap().into_definition().is_err());
    }
}
