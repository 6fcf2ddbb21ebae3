//! Execution context handed to local handlers.

use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Memory limit reported to local handlers.
pub const MEMORY_LIMIT_IN_MB: &str = "128";

/// Execution context for a single local invocation.
///
/// Mirrors the shape a hosted runtime hands to functions. Values that only
/// make sense inside a hosted runtime are fixed placeholders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    pub callback_waits_for_empty_event_loop: bool,
    pub function_name: String,
    pub function_version: String,
    pub invoked_function_arn: String,
    pub memory_limit_in_mb: String,
    /// Fresh per invocation.
    pub aws_request_id: String,
    pub log_group_name: String,
    pub log_stream_name: String,
    /// Environment variables available to the handler.
    #[serde(skip)]
    pub env: HashMap<String, String>,
}

impl Context {
    /// Create a context with a fresh invocation id.
    pub fn new(function_name: impl Into<String>) -> Self {
        let function_name = function_name.into();
        Self {
            callback_waits_for_empty_event_loop: true,
            invoked_function_arn: format!("function://{}", function_name),
            log_group_name: format!("/functions/{}", function_name),
            function_name,
            function_version: "$LATEST".to_string(),
            memory_limit_in_mb: MEMORY_LIMIT_IN_MB.to_string(),
            aws_request_id: Uuid::new_v4().to_string(),
            log_stream_name: "local".to_string(),
            env: HashMap::new(),
        }
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Get an environment variable.
    pub fn get_env(&self, key: &str) -> Option<&String> {
        self.env.get(key)
    }

    /// Local invocations have no deadline.
    pub fn remaining_time_in_millis(&self) -> u64 {
        0
    }

    pub fn done(&self) {}

    pub fn succeed(&self) {}

    pub fn fail(&self) {}
}
