//! Agent Invoker — the single seam between the engine and the agents that
//! actually do the work.
//!
//! Dispatch is data, not control flow: a [`HandlerRegistry`] maps each
//! `(agent, action)` pair to a registered [`ActionHandler`], and new actions
//! are added by registration. The invoker carries no retry, backoff or
//! timeout logic; callers layer those on top if they need them.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StepError;
use crate::models::Payload;

/// Sends an action with inputs to a named logical agent.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(&self, agent: &str, action: &str, inputs: Payload)
        -> Result<Payload, StepError>;
}

/// One registered action.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, inputs: Payload) -> Result<Payload, StepError>;
}

#[async_trait]
impl<F, Fut> ActionHandler for F
where
    F: Fn(Payload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Payload, StepError>> + Send + 'static,
{
    async fn handle(&self, inputs: Payload) -> Result<Payload, StepError> {
        (self)(inputs).await
    }
}

/// Handler lookup table keyed by `(agent, action)`.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<(String, String), Arc<dyn ActionHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for `(agent, action)`.
    pub fn register<H>(&mut self, agent: &str, action: &str, handler: H) -> &mut Self
    where
        H: ActionHandler + 'static,
    {
        let key = (agent.to_string(), action.to_string());
        if self.handlers.insert(key, Arc::new(handler)).is_some() {
            tracing::debug!("[Invoker] Replaced handler for {}.{}", agent, action);
        }
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<H>(mut self, agent: &str, action: &str, handler: H) -> Self
    where
        H: ActionHandler + 'static,
    {
        self.register(agent, action, handler);
        self
    }

    pub fn contains(&self, agent: &str, action: &str) -> bool {
        self.handlers
            .contains_key(&(agent.to_string(), action.to_string()))
    }

    /// Registered `(agent, action)` pairs, sorted.
    pub fn actions(&self) -> Vec<(String, String)> {
        let mut actions: Vec<_> = self.handlers.keys().cloned().collect();
        actions.sort();
        actions
    }
}

#[async_trait]
impl AgentInvoker for HandlerRegistry {
    async fn invoke(
        &self,
        agent: &str,
        action: &str,
        inputs: Payload,
    ) -> Result<Payload, StepError> {
        let handler = self
            .handlers
            .get(&(agent.to_string(), action.to_string()))
            .cloned()
            .ok_or_else(|| StepError::unknown_action(agent, action))?;

        tracing::debug!("[Invoker] Invoking {}.{}", agent, action);
        handler.handle(inputs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn echo(inputs: Payload) -> Result<Payload, StepError> {
        Ok(inputs)
    }

    #[tokio::test]
    async fn test_dispatch_to_registered_handler() {
        let registry = HandlerRegistry::new()
            .with("builtin", "echo", echo)
            .with("math", "double", |inputs: Payload| async move {
                let n = inputs.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
                let mut out = Payload::new();
                out.insert("n".to_string(), json!(n * 2));
                Ok::<_, StepError>(out)
            });

        let mut inputs = Payload::new();
        inputs.insert("n".to_string(), json!(21));

        let echoed = registry.invoke("builtin", "echo", inputs.clone()).await.unwrap();
        assert_eq!(echoed, inputs);
        let doubled = registry.invoke("math", "double", inputs).await.unwrap();
        assert_eq!(doubled["n"], 42);
    }

    #[tokio::test]
    async fn test_unknown_pair_is_unknown_action() {
        let registry = HandlerRegistry::new().with("builtin", "echo", echo);
        let err = registry
            .invoke("builtin", "shout", Payload::new())
            .await
            .unwrap_err();
        assert_eq!(err, StepError::unknown_action("builtin", "shout"));
        assert!(!registry.contains("other", "echo"));
    }

    #[test]
    fn test_register_replaces_and_lists_sorted() {
        let mut registry = HandlerRegistry::new();
        registry
            .register("b", "run", echo)
            .register("a", "run", echo)
            .register("a", "run", echo);
        assert_eq!(
            registry.actions(),
            vec![
                ("a".to_string(), "run".to_string()),
                ("b".to_string(), "run".to_string())
            ]
        );
    }
}
