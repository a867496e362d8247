use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::WorkflowError;

/// String-keyed JSON map used for params, step inputs, agent results and
/// task results.
pub type Payload = Map<String, Value>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StepStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "SKIPPED")]
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
        }
    }

    /// Steps only move forward: `PENDING → RUNNING → {COMPLETED, FAILED}`,
    /// or `PENDING → SKIPPED` when the condition is false.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Skipped)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }

    /// Counts toward progress.
    pub fn is_done(self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub name: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Payload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl StepRecord {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Pending,
            result: None,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }
}

/// One invocation of a workflow with concrete parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub workflow_name: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub params: Payload,
    pub steps: Vec<StepRecord>,
    #[serde(default)]
    pub results: Payload,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Task {
    pub fn new<I, S>(workflow_name: impl Into<String>, step_names: I, params: Payload) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workflow_name: workflow_name.into(),
            status: TaskStatus::Pending,
            params,
            steps: step_names.into_iter().map(StepRecord::pending).collect(),
            results: Payload::new(),
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }

    /// Percentage of steps that are `COMPLETED` or `SKIPPED`.
    pub fn progress(&self) -> u8 {
        if self.steps.is_empty() {
            return if self.status == TaskStatus::Completed { 100 } else { 0 };
        }
        let done = self.steps.iter().filter(|s| s.status.is_done()).count();
        ((done * 100) / self.steps.len()) as u8
    }

    /// The step currently executing, if any.
    pub fn current_step(&self) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.status == StepStatus::Running)
    }

    pub fn failed_step(&self) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.status == StepStatus::Failed)
    }

    /// Human-readable status line.
    pub fn status_message(&self) -> String {
        match self.status {
            TaskStatus::Pending => "Waiting to start".to_string(),
            TaskStatus::Running => match self.current_step() {
                Some(step) => format!("Executing step: {}", step.name),
                None => {
                    let done = self.steps.iter().filter(|s| s.status.is_done()).count();
                    format!("Running ({}/{} steps done)", done, self.steps.len())
                }
            },
            TaskStatus::Completed => "Workflow completed".to_string(),
            TaskStatus::Failed => match self.failed_step() {
                Some(step) => format!("Failed at step: {}", step.name),
                None => "Workflow failed".to_string(),
            },
            TaskStatus::Cancelled => "Task cancelled".to_string(),
        }
    }

    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            id: self.id.clone(),
            workflow_name: self.workflow_name.clone(),
            status: self.status,
            progress: self.progress(),
            current_step: self.current_step().map(|s| s.name.clone()),
            started_at: self.started_at,
        }
    }

    pub fn status_report(&self) -> TaskStatusReport {
        TaskStatusReport {
            id: self.id.clone(),
            workflow_name: self.workflow_name.clone(),
            status: self.status,
            progress: self.progress(),
            message: self.status_message(),
            error: self.error.clone(),
            steps: self.steps.clone(),
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }

    // ─── Transitions ──────────────────────────────────────────────────────
    //
    // Each returns whether the transition was applied. A rejected transition
    // leaves the task untouched.

    /// `PENDING → RUNNING`.
    pub fn mark_running(&mut self) -> bool {
        if self.status != TaskStatus::Pending {
            return false;
        }
        self.status = TaskStatus::Running;
        true
    }

    pub fn start_step(&mut self, index: usize) -> bool {
        self.move_step(index, StepStatus::Running)
    }

    pub fn skip_step(&mut self, index: usize) -> bool {
        self.move_step(index, StepStatus::Skipped)
    }

    /// Marks the step `COMPLETED` and merges its mapped output into `results`.
    pub fn complete_step(&mut self, index: usize, output: Payload) -> bool {
        if !self.move_step(index, StepStatus::Completed) {
            return false;
        }
        for (key, value) in &output {
            self.results.insert(key.clone(), value.clone());
        }
        self.steps[index].result = Some(output);
        true
    }

    /// Marks the step `FAILED` and, unless the task was cancelled, the task too.
    pub fn fail_step(&mut self, index: usize, error: impl Into<String>) -> bool {
        if !self.move_step(index, StepStatus::Failed) {
            return false;
        }
        let error = error.into();
        let message = format!("Step '{}' failed: {}", self.steps[index].name, error);
        self.steps[index].error = Some(error);
        if self.status != TaskStatus::Cancelled {
            self.status = TaskStatus::Failed;
            self.error = Some(message);
            self.completed_at = Some(Utc::now());
        }
        true
    }

    /// Fails the step a run stopped on when it ended abnormally: the running
    /// step, or else the first one still pending. Falls back to [`abort`]
    /// when every step is already settled. A cancelled task keeps its status.
    ///
    /// [`abort`]: Self::abort
    pub fn fail_interrupted(&mut self, error: impl Into<String>) -> bool {
        if matches!(self.status, TaskStatus::Completed | TaskStatus::Failed) {
            return false;
        }
        let error = error.into();
        let interrupted = self
            .steps
            .iter()
            .position(|s| s.status == StepStatus::Running)
            .or_else(|| self.steps.iter().position(|s| s.status == StepStatus::Pending));
        match interrupted {
            Some(index) => {
                if self.steps[index].status == StepStatus::Pending {
                    self.move_step(index, StepStatus::Running);
                }
                self.fail_step(index, error)
            }
            None => self.abort(error),
        }
    }

    /// Fails the task without blaming a step (e.g. the ledger entry no longer
    /// matches its workflow).
    pub fn abort(&mut self, error: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = TaskStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
        true
    }

    /// Settles the terminal status once the run is over. The task becomes
    /// `COMPLETED` only when every step is `COMPLETED` or `SKIPPED`.
    pub fn finish(&mut self) -> TaskStatus {
        if self.status.is_active() && self.steps.iter().all(|s| s.status.is_done()) {
            self.status = TaskStatus::Completed;
            self.completed_at = Some(Utc::now());
        }
        self.status
    }

    /// `PENDING | RUNNING → CANCELLED`. Does not touch step records.
    pub fn cancel(&mut self) -> Result<(), WorkflowError> {
        if !self.status.is_active() {
            return Err(WorkflowError::InvalidState {
                id: self.id.clone(),
                status: self.status,
            });
        }
        self.status = TaskStatus::Cancelled;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    fn move_step(&mut self, index: usize, next: StepStatus) -> bool {
        let Some(step) = self.steps.get_mut(index) else {
            return false;
        };
        if !step.status.can_transition_to(next) {
            return false;
        }
        let now = Utc::now();
        match next {
            StepStatus::Running => step.started_at = Some(now),
            _ => step.completed_at = Some(now),
        }
        step.status = next;
        true
    }
}

/// Row in the active-task listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub id: String,
    pub workflow_name: String,
    pub status: TaskStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    pub started_at: DateTime<Utc>,
}

/// Answer to a status query. Step records carry the partial results of a
/// task that did not complete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusReport {
    pub id: String,
    pub workflow_name: String,
    pub status: TaskStatus,
    pub progress: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub steps: Vec<StepRecord>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}
