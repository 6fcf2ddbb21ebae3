//! Remote function invocation providers.

mod http;

pub use self::http::HttpInvoker;

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";

/// How the provider runs the function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum InvocationType {
    /// Wait for the result.
    #[default]
    RequestResponse,
    /// Queue and return immediately.
    Event,
    /// Validate only.
    DryRun,
}

impl InvocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationType::RequestResponse => "RequestResponse",
            InvocationType::Event => "Event",
            InvocationType::DryRun => "DryRun",
        }
    }
}

/// A request to invoke a named function.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InvocationRequest {
    pub function_name: String,
    pub invocation_type: InvocationType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
    /// Serialized invocation event.
    pub payload: String,
}

/// What the provider returned.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InvocationResponse {
    pub status_code: u16,
    /// Raw result payload, normally JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    /// Set when the function failed (`Handled` or `Unhandled`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_version: Option<String>,
}

/// Errors reported by an invocation provider.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The call was cancelled through its abort handle.
    #[error("Invocation aborted")]
    Aborted,

    /// The provider rejected the call.
    #[error("Invocation failed with status {status}: {message}")]
    Service { status: u16, message: String },

    /// The call never reached the provider or its answer was unreadable.
    #[error("Invocation transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The request could not be built or signed.
    #[error("Invalid invocation request: {0}")]
    InvalidRequest(String),
}

/// A remote invocation provider.
///
/// `abort` is the handle for the in-flight call: the caller cancels it when
/// it stops waiting, and implementations should stop work when it fires.
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(
        &self,
        request: InvocationRequest,
        abort: CancellationToken,
    ) -> Result<InvocationResponse, InvokeError>;
}

/// Settings for the default provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvokerOptions {
    /// Provider endpoint; defaults to the regional endpoint.
    pub endpoint: Option<String>,
    pub region: Option<String>,
    /// Per-request timeout, connecting included.
    pub timeout: Option<Duration>,
}

impl InvokerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `FUNCTION_ENDPOINT` (or `LAMBDA_ENDPOINT`) and `AWS_REGION`
    /// (or `AWS_DEFAULT_REGION`).
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            endpoint: var("FUNCTION_ENDPOINT").or_else(|| var("LAMBDA_ENDPOINT")),
            region: var("AWS_REGION").or_else(|| var("AWS_DEFAULT_REGION")),
            timeout: None,
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The configured region or [`DEFAULT_REGION`].
    pub fn resolved_region(&self) -> &str {
        self.region.as_deref().unwrap_or(DEFAULT_REGION)
    }

    /// The configured endpoint or the regional default.
    pub fn resolved_endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://lambda.{}.amazonaws.com", self.resolved_region()),
        }
    }
}
