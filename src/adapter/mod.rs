//! Transports and transport selection.
//!
//! ```text
//!  RequestConfig
//!       │
//!       ▼
//!  AdapterChain ──► override ─► local handler ─► remote invocation ─► network
//!  (first match wins)
//! ```

mod chain;
mod local;
mod network;
mod remote;

pub use chain::{AdapterChain, AdapterEntry, Predicate};
pub use local::LocalHandlerAdapter;
pub use network::NetworkAdapter;
pub use remote::RemoteInvocationAdapter;

use crate::client::RequestConfig;
use crate::codec::InvocationEvent;
use crate::error::Result;
use crate::function::Context;
use crate::http::{Headers, Method, Response};
use crate::invoke::InvocationRequest;
use async_trait::async_trait;

/// A transport: turns a fully prepared request into a response.
#[async_trait]
pub trait Adapter: Send + Sync {
    async fn dispatch(&self, config: RequestConfig) -> Result<Response>;
}

/// What a transport actually sent.
#[derive(Debug, Clone)]
pub enum DispatchedRequest {
    /// Event and context handed to a local handler.
    Handler {
        event: InvocationEvent,
        context: Context,
    },
    /// Request handed to the remote invocation provider.
    Invocation(InvocationRequest),
    /// Request sent over the network.
    Http {
        method: Method,
        url: String,
        headers: Headers,
    },
}

impl DispatchedRequest {
    /// The event, for requests served by a handler.
    pub fn event(&self) -> Option<&InvocationEvent> {
        match self {
            DispatchedRequest::Handler { event, .. } => Some(event),
            _ => None,
        }
    }
}
