//! The unified error type returned by every transport.

use crate::adapter::DispatchedRequest;
use crate::client::RequestConfig;
use crate::http::{Response, StatusCode};
use thiserror::Error;

/// Transport code attached to timeouts, matching what socket-level clients
/// report for aborted connections.
pub const ABORTED: &str = "ECONNABORTED";

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A response was received but its status was rejected.
    StatusValidation,
    /// A local handler failed.
    HandlerInvocation,
    /// The remote invocation provider failed.
    RemoteInvocation,
    /// The remote invocation did not finish within the configured timeout.
    RemoteInvocationTimeout,
    /// The invocation finished without a usable payload.
    MalformedPayload,
    /// The provider reported a handled or unhandled function failure.
    FunctionError,
    /// Too many 301/302 hops.
    RedirectBudgetExceeded,
    /// The requested response type cannot be produced by this transport.
    UnsupportedResponseType,
    /// The target is not a valid `function://` URL.
    InvalidFunctionUrl,
    /// The target could not be parsed or resolved.
    InvalidUrl,
    /// The network transport failed before a response was received.
    Network,
    /// The request could not be signed.
    Signing,
}

/// Error raised for any failed request, regardless of transport.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct RequestError {
    /// What went wrong.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// The configuration the request was dispatched with.
    pub config: Box<RequestConfig>,
    /// What was sent to the transport, if anything was built.
    pub request: Option<Box<DispatchedRequest>>,
    /// The response, when one was produced.
    pub response: Option<Box<Response>>,
    /// Transport error code, e.g. [`ABORTED`].
    pub code: Option<String>,
    /// Underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl RequestError {
    /// Create a new error.
    pub fn new(kind: ErrorKind, message: impl Into<String>, config: RequestConfig) -> Self {
        Self {
            kind,
            message: message.into(),
            config: Box::new(config),
            request: None,
            response: None,
            code: None,
            source: None,
        }
    }

    /// Attach the request that was dispatched.
    pub fn with_request(mut self, request: DispatchedRequest) -> Self {
        self.request = Some(Box::new(request));
        self
    }

    /// Attach the response that was produced.
    pub fn with_response(mut self, response: Response) -> Self {
        self.response = Some(Box::new(response));
        self
    }

    /// Attach a transport error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Create a status-validation error for a rejected response.
    pub fn status(response: Response) -> Self {
        let message = format!("Request failed with status code {}", response.status);
        let config = response.config.clone();
        let request = response.request.clone();
        Self::new(ErrorKind::StatusValidation, message, config)
            .with_request(request)
            .with_response(response)
    }

    /// Whether this invocation itself timed out.
    pub fn is_invoke_timeout(&self) -> bool {
        self.kind == ErrorKind::RemoteInvocationTimeout
    }

    /// Whether the transport aborted the request.
    pub fn is_aborted(&self) -> bool {
        self.code.as_deref() == Some(ABORTED)
    }

    /// Status of the attached response, if any.
    pub fn response_status(&self) -> Option<StatusCode> {
        self.response.as_ref().map(|r| r.status)
    }
}

/// Result type for client operations.
pub type Result<T, E = RequestError> = std::result::Result<T, E>;

/// Error raised while building a [`Client`](crate::client::Client).
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Failed to build the network transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Failed to build the invocation transport: {0}")]
    Invoker(#[from] crate::invoke::InvokeError),
}
