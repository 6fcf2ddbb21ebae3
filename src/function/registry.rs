//! Named handler registry.

use crate::function::handler::{Handler, HandlerError};
use crate::function::Context;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Registry of local handlers addressable by function name.
///
/// A `function://name/...` request whose name is registered here is served
/// in-process instead of being invoked remotely. Lookups are synchronous so
/// transport predicates can consult the registry.
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn Handler>>>,
    /// Environment variables copied into every handler context.
    global_env: HashMap<String, String>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            global_env: HashMap::new(),
        }
    }

    /// Create an empty registry with global environment variables.
    pub fn with_env(env: HashMap<String, String>) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            global_env: env,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<dyn Handler>>> {
        self.handlers.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<dyn Handler>>> {
        self.handlers.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a handler under a function name.
    pub fn register(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn Handler>,
    ) -> Result<(), HandlerError> {
        let name = name.into();
        let mut handlers = self.write();

        if handlers.contains_key(&name) {
            return Err(HandlerError::new(format!(
                "Handler '{}' is already registered",
                name
            )));
        }

        handlers.insert(name.clone(), handler);
        info!("Registered handler: {}", name);
        Ok(())
    }

    /// Look up a handler.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        let handler = self.read().get(name).cloned();
        if handler.is_none() {
            debug!("No local handler registered for '{}'", name);
        }
        handler
    }

    /// Check whether a handler is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// List registered function names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove a handler.
    pub fn remove(&self, name: &str) -> Result<(), HandlerError> {
        self.write()
            .remove(name)
            .ok_or_else(|| HandlerError::new(format!("Handler '{}' not found", name)))?;

        info!("Removed handler: {}", name);
        Ok(())
    }

    /// Build a fresh invocation context carrying the global environment.
    pub fn context(&self, function_name: &str) -> Context {
        let mut context = Context::new(function_name);
        for (k, v) in &self.global_env {
            context.env.insert(k.clone(), v.clone());
        }
        context
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.list())
            .finish_non_exhaustive()
    }
}
