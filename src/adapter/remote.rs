//! Remote function invocation transport.

use crate::adapter::{Adapter, DispatchedRequest};
use crate::client::RequestConfig;
use crate::codec::{build_event, build_response, Payload};
use crate::error::{ErrorKind, RequestError, Result, ABORTED};
use crate::http::Response;
use crate::invoke::{
    HttpInvoker, InvocationRequest, InvocationResponse, InvocationType, InvokeError, Invoker,
    InvokerOptions,
};
use crate::resolve::{is_function_url, resolve_optional, FunctionUrl};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Invokes `function://` targets through an [`Invoker`].
pub struct RemoteInvocationAdapter {
    invoker: Option<Arc<dyn Invoker>>,
    http: HttpInvoker,
}

impl RemoteInvocationAdapter {
    /// Create a transport. Requests without an injected invoker go through
    /// `http`, with the request's endpoint and timeout applied.
    pub fn new(http: HttpInvoker) -> Self {
        Self { invoker: None, http }
    }

    /// Create a transport whose environment-configured [`HttpInvoker`] is
    /// built once here.
    pub fn from_env() -> std::result::Result<Self, InvokeError> {
        Ok(Self::new(HttpInvoker::new(InvokerOptions::from_env())?))
    }

    /// Send every request without its own invoker through `invoker`.
    pub fn with_invoker(mut self, invoker: Arc<dyn Invoker>) -> Self {
        self.invoker = Some(invoker);
        self
    }

    /// Whether this transport handles `config`.
    pub fn applies(config: &RequestConfig) -> bool {
        matches!(config.full_url(), Ok(Some(url)) if is_function_url(&url))
    }

    fn invoker_for(&self, config: &RequestConfig) -> Arc<dyn Invoker> {
        match config.invoker.clone().or_else(|| self.invoker.clone()) {
            Some(invoker) => invoker,
            None => Arc::new(self.http_for(config)),
        }
    }

    /// The shared [`HttpInvoker`] with the request's endpoint and timeout.
    fn http_for(&self, config: &RequestConfig) -> HttpInvoker {
        let mut options = self.http.options().clone();
        if let Some(endpoint) = &config.function_endpoint {
            options.endpoint = Some(endpoint.clone());
        }
        options.timeout = config.timeout;
        self.http.with_options(options)
    }
}

/// The target URL; falls back to plain concatenation when it cannot be
/// resolved so the error can name what was asked for.
fn target_url(config: &RequestConfig) -> String {
    match resolve_optional(config.url.as_deref(), config.base_url.as_deref()) {
        Ok(url) => url.unwrap_or_default(),
        Err(_) => format!(
            "{}{}",
            config.base_url.as_deref().unwrap_or_default(),
            config.url.as_deref().unwrap_or_default()
        ),
    }
}

#[async_trait]
impl Adapter for RemoteInvocationAdapter {
    async fn dispatch(&self, config: RequestConfig) -> Result<Response> {
        let url = target_url(&config);
        let Some(function) = FunctionUrl::parse(&url) else {
            return Err(RequestError::new(
                ErrorKind::InvalidFunctionUrl,
                format!("The config.url, '{}' does not appear to be a valid function URL", url),
                config,
            ));
        };

        let event = build_event(&config, Some(&function.path)).map_err(|err| {
            RequestError::new(ErrorKind::InvalidFunctionUrl, err.to_string(), config.clone())
                .with_source(err)
        })?;
        let payload = serde_json::to_string(&event).map_err(|err| {
            RequestError::new(ErrorKind::RemoteInvocation, err.to_string(), config.clone())
                .with_source(err)
        })?;

        let invocation = InvocationRequest {
            function_name: function.name.clone(),
            invocation_type: InvocationType::RequestResponse,
            qualifier: function.qualifier.clone(),
            payload,
        };
        let request = DispatchedRequest::Invocation(invocation.clone());
        let invoker = self.invoker_for(&config);

        debug!(
            function = %function.name,
            qualifier = ?function.qualifier,
            path = %event.path,
            request_id = %event.request_context.request_id,
            "Invoking remote function"
        );

        let abort = CancellationToken::new();
        let call = invoker.invoke(invocation, abort.clone());
        let result = match config.timeout {
            Some(timeout) => tokio::select! {
                result = call => result,
                _ = tokio::time::sleep(timeout) => {
                    abort.cancel();
                    warn!("Invocation of '{}' timed out after {}ms", function.name, timeout.as_millis());
                    return Err(RequestError::new(
                        ErrorKind::RemoteInvocationTimeout,
                        format!("Timeout after {}ms", timeout.as_millis()),
                        config,
                    )
                    .with_request(request)
                    .with_code(ABORTED));
                }
            },
            None => call.await,
        };

        let result = match result {
            Ok(result) => result,
            Err(err) => {
                error!("Invocation of '{}' failed: {}", function.name, err);
                return Err(RequestError::new(ErrorKind::RemoteInvocation, err.to_string(), config)
                    .with_request(request)
                    .with_source(err));
            }
        };

        let Some(payload) = parse_payload(&result) else {
            let raw = serde_json::to_string_pretty(&result).unwrap_or_default();
            return Err(RequestError::new(
                ErrorKind::MalformedPayload,
                format!("Unexpected Payload shape from {}. The full response was\n{}", url, raw),
                config,
            )
            .with_request(request));
        };

        if let Some(kind) = result.function_error.as_deref().filter(|kind| !kind.is_empty()) {
            warn!("Function '{}' reported a {} error", function.name, kind);
            let message = payload
                .error_message
                .unwrap_or_else(|| format!("Function reported a {} error", kind));
            return Err(RequestError::new(ErrorKind::FunctionError, message, config)
                .with_request(request)
                .with_code(kind));
        }

        build_response(&config, request, payload)
    }
}

fn parse_payload(result: &InvocationResponse) -> Option<Payload> {
    let raw = result.payload.as_deref().filter(|raw| !raw.trim().is_empty())?;
    serde_json::from_str::<Option<Payload>>(raw).ok().flatten()
}
