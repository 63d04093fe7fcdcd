// src/exec/registry.rs

//! Explicit `(agent, kind)` → handler lookup.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::dag::Params;

/// Behaviour behind one `(agent, kind)` pair.
///
/// Handlers run on a blocking thread, bounded by the task's timeout.
/// Any `Fn(&Params) -> Result<Value, String>` closure is a handler.
pub trait TaskHandler: Send + Sync {
    fn handle(&self, params: &Params) -> Result<Value, String>;
}

impl<F> TaskHandler for F
where
    F: Fn(&Params) -> Result<Value, String> + Send + Sync,
{
    fn handle(&self, params: &Params) -> Result<Value, String> {
        self(params)
    }
}

/// Worker registry, built once at startup and handed to the backend.
#[derive(Default, Clone)]
pub struct WorkerRegistry {
    handlers: HashMap<(String, String), Arc<dyn TaskHandler>>,
    /// Per-agent handler for kinds without a dedicated entry.
    fallbacks: HashMap<String, Arc<dyn TaskHandler>>,
}

impl fmt::Debug for WorkerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self
            .handlers
            .keys()
            .map(|(agent, kind)| format!("{agent}/{kind}"))
            .collect();
        keys.sort();
        let mut fallbacks: Vec<&String> = self.fallbacks.keys().collect();
        fallbacks.sort();

        f.debug_struct("WorkerRegistry")
            .field("handlers", &keys)
            .field("fallbacks", &fallbacks)
            .finish()
    }
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in stub workers.
    pub fn with_builtin_workers() -> Self {
        let mut registry = Self::new();
        crate::workers::register_builtin(&mut registry);
        registry
    }

    pub fn register(
        &mut self,
        agent: impl Into<String>,
        kind: impl Into<String>,
        handler: impl TaskHandler + 'static,
    ) -> &mut Self {
        let key = (agent.into(), kind.into());
        debug!(agent = %key.0, kind = %key.1, "registering worker");
        self.handlers.insert(key, Arc::new(handler));
        self
    }

    /// Register a handler for every kind of `agent` without its own entry.
    pub fn register_fallback(
        &mut self,
        agent: impl Into<String>,
        handler: impl TaskHandler + 'static,
    ) -> &mut Self {
        self.fallbacks.insert(agent.into(), Arc::new(handler));
        self
    }

    pub fn resolve(&self, agent: &str, kind: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers
            .get(&(agent.to_string(), kind.to_string()))
            .or_else(|| self.fallbacks.get(agent))
            .cloned()
    }

    pub fn contains(&self, agent: &str, kind: &str) -> bool {
        self.resolve(agent, kind).is_some()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty() && self.fallbacks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exact_entry_wins_over_fallback() {
        let mut registry = WorkerRegistry::new();
        registry
            .register("travel", "find_flights", |_: &Params| Ok::<_, String>(json!("exact")))
            .register_fallback("travel", |_: &Params| Ok::<_, String>(json!("fallback")));

        let params = Params::new();
        let exact = registry.resolve("travel", "find_flights").unwrap();
        assert_eq!(exact.handle(&params), Ok(json!("exact")));

        let other = registry.resolve("travel", "find_hotels").unwrap();
        assert_eq!(other.handle(&params), Ok(json!("fallback")));

        assert!(registry.resolve("finance", "find_flights").is_none());
    }
}
