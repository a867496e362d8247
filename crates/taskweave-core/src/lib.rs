//! Taskweave Core — workflow orchestration engine.
//!
//! This crate turns a declarative pipeline of named steps (each bound to a
//! logical agent and action) into a tracked, persisted task:
//!
//! ```text
//! caller ──► TaskRegistry::start ──► WorkflowEngine ──► AgentInvoker
//!                 │                        │
//!                 │                   TaskLedger (atomic publish + JSON snapshot)
//!                 ▼
//!   get_status / get_artifacts / list / cancel
//! ```
//!
//! It has no transport dependency: agents are reached through the
//! [`AgentInvoker`](workflow::AgentInvoker) trait, and the CLI (or any other
//! front end) only talks to the [`TaskRegistry`].

pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod registry;
pub mod store;
pub mod workflow;

// Convenience re-exports
pub use config::Settings;
pub use error::{StepError, WorkflowError};
pub use ledger::TaskLedger;
pub use models::{Payload, StepRecord, StepStatus, Task, TaskStatus, TaskStatusReport, TaskSummary};
pub use registry::TaskRegistry;
