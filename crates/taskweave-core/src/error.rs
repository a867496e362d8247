//! Core error types.
//!
//! `WorkflowError` is surfaced synchronously by the registry, the ledger and
//! the definition loaders. `StepError` never crosses the engine boundary: it
//! is recorded on the failing step and on its task.

use crate::models::TaskStatus;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Unknown workflow: {0}")]
    UnknownWorkflow(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task {id} is not completed (status: {status})")]
    TaskNotCompleted { id: String, status: TaskStatus },

    #[error("Task {id} is in state {status} and cannot be changed")]
    InvalidState { id: String, status: TaskStatus },

    #[error("Invalid workflow definition: {0}")]
    Definition(String),

    #[error("Ledger error: {0}")]
    Ledger(String),
}

/// Failure of a single step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepError {
    /// No handler is registered for the `(agent, action)` pair.
    #[error("Unknown action '{action}' for agent '{agent}'")]
    UnknownAction { agent: String, action: String },

    /// Anything else raised while building inputs, invoking or mapping output.
    #[error("{0}")]
    Failure(String),
}

impl StepError {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }

    pub fn unknown_action(agent: &str, action: &str) -> Self {
        Self::UnknownAction {
            agent: agent.to_string(),
            action: action.to_string(),
        }
    }
}
