//! Ordered, predicate-gated transport selection.

use crate::adapter::Adapter;
use crate::client::RequestConfig;
use std::sync::Arc;
use tracing::debug;

/// Decides whether an entry handles a request. Must be cheap and free of
/// side effects; it runs on every dispatch, including retries and redirects.
pub type Predicate = Arc<dyn Fn(&RequestConfig) -> bool + Send + Sync>;

/// One transport in the chain.
#[derive(Clone)]
pub struct AdapterEntry {
    /// Name used in logs.
    pub name: &'static str,
    /// Higher runs first.
    pub priority: u32,
    /// Disabled entries never match.
    pub enabled: bool,
    predicate: Predicate,
    adapter: Arc<dyn Adapter>,
}

impl AdapterEntry {
    /// Create an entry.
    pub fn new(name: &'static str, predicate: Predicate, adapter: Arc<dyn Adapter>) -> Self {
        Self {
            name,
            priority: 0,
            enabled: true,
            predicate,
            adapter,
        }
    }

    /// Set the priority.
    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the enabled state.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Check if this entry handles `config`.
    pub fn matches(&self, config: &RequestConfig) -> bool {
        self.enabled && (self.predicate)(config)
    }
}

impl std::fmt::Debug for AdapterEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterEntry")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

/// Transports evaluated in priority order; the first whose predicate
/// matches handles the request, otherwise the fallback does.
///
/// A per-request [`RequestConfig::adapter`] overrides the chain.
pub struct AdapterChain {
    entries: Vec<AdapterEntry>,
    fallback: Arc<dyn Adapter>,
}

impl AdapterChain {
    /// Create a chain with only the fallback transport.
    pub fn new(fallback: Arc<dyn Adapter>) -> Self {
        Self {
            entries: Vec::new(),
            fallback,
        }
    }

    /// Add an entry. Equal priorities keep insertion order.
    pub fn add(&mut self, entry: AdapterEntry) {
        self.entries.push(entry);
        // Stable sort, highest priority first
        self.entries.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Builder-style [`AdapterChain::add`].
    pub fn with(mut self, entry: AdapterEntry) -> Self {
        self.add(entry);
        self
    }

    /// Pick the transport for `config`.
    pub fn select(&self, config: &RequestConfig) -> (&'static str, Arc<dyn Adapter>) {
        if let Some(adapter) = &config.adapter {
            debug!("Using per-request adapter override");
            return ("override", adapter.clone());
        }

        match self.entries.iter().find(|entry| entry.matches(config)) {
            Some(entry) => {
                debug!("Selected adapter: {}", entry.name);
                (entry.name, entry.adapter.clone())
            }
            None => {
                debug!("Selected fallback adapter");
                ("fallback", self.fallback.clone())
            }
        }
    }

    /// List entries in evaluation order.
    pub fn list(&self) -> Vec<&AdapterEntry> {
        self.entries.iter().collect()
    }
}
