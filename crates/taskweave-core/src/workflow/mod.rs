//! Workflow engine — ordered, agent-bound step pipelines.
//!
//! Step Definition Sets are built in code ([`WorkflowDefinition`]) or loaded
//! from YAML files ([`WorkflowFile`]), collected in a [`WorkflowCatalog`] and
//! executed by the [`WorkflowEngine`], which reaches agents only through the
//! [`AgentInvoker`] trait.
//!
//! ```text
//! workflow.yaml ──► WorkflowFile ──► WorkflowDefinition ──► WorkflowCatalog
//!                                                                │
//!                                    TaskLedger ◄── WorkflowEngine
//!                                                                │
//!                                                  AgentInvoker (HandlerRegistry)
//! ```

pub mod catalog;
pub mod condition;
pub mod definition;
pub mod executor;
pub mod invoker;
pub mod schema;
pub mod template;

pub use catalog::WorkflowCatalog;
pub use condition::Condition;
pub use definition::{StepDefinition, WorkflowDefinition};
pub use executor::WorkflowEngine;
pub use invoker::{ActionHandler, AgentInvoker, HandlerRegistry};
pub use schema::{StepSpec, WorkflowFile};
