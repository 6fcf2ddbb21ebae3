//! In-process handler transport.

use crate::adapter::{Adapter, DispatchedRequest};
use crate::client::RequestConfig;
use crate::codec::{build_event, build_response, Payload};
use crate::error::{ErrorKind, RequestError, Result};
use crate::function::{invoke, Handler, HandlerRegistry};
use crate::http::Response;
use crate::resolve::{is_absolute_url, FunctionUrl};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::GzDecoder;
use serde_json::Value;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, error};

/// Function name reported to handlers serving plain paths.
const LOCAL_FUNCTION_NAME: &str = "local";

/// Serves requests with an explicitly configured handler, or with a
/// registered handler whose name matches a `function://` target.
pub struct LocalHandlerAdapter {
    registry: Arc<HandlerRegistry>,
}

impl LocalHandlerAdapter {
    /// Create a transport backed by `registry`.
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    /// Whether this transport handles `config`.
    ///
    /// A configured handler serves relative and `function://` targets; other
    /// absolute URLs go to the network. Without one, a `function://` target
    /// is served when its name is registered.
    pub fn applies(&self, config: &RequestConfig) -> bool {
        let Ok(target) = config.full_url() else {
            return false;
        };
        let function = target.as_deref().and_then(FunctionUrl::parse);

        if config.handler.is_some() {
            return match target.as_deref() {
                None => true,
                Some(url) => function.is_some() || !is_absolute_url(url),
            };
        }

        function.is_some_and(|f| self.registry.contains(&f.name))
    }

    fn handler_for(&self, config: &RequestConfig, function: Option<&FunctionUrl>) -> Option<Arc<dyn Handler>> {
        config
            .handler
            .clone()
            .or_else(|| function.and_then(|f| self.registry.get(&f.name)))
    }
}

#[async_trait]
impl Adapter for LocalHandlerAdapter {
    async fn dispatch(&self, config: RequestConfig) -> Result<Response> {
        let target = config
            .full_url()
            .map_err(|err| {
                RequestError::new(ErrorKind::InvalidUrl, err.to_string(), config.clone()).with_source(err)
            })?
            .unwrap_or_else(|| "/".to_string());
        let function = FunctionUrl::parse(&target);

        let Some(handler) = self.handler_for(&config, function.as_ref()) else {
            return Err(RequestError::new(
                ErrorKind::HandlerInvocation,
                format!("No local handler for '{}'", target),
                config,
            ));
        };

        let relative = function.as_ref().map_or(target.as_str(), |f| f.path.as_str());
        let event = build_event(&config, Some(relative)).map_err(|err| {
            RequestError::new(
                ErrorKind::InvalidUrl,
                format!("Unable to build an event for '{}': {}", target, err),
                config.clone(),
            )
            .with_source(err)
        })?;
        let function_name = function.as_ref().map_or(LOCAL_FUNCTION_NAME, |f| f.name.as_str());
        let context = self.registry.context(function_name);

        debug!(
            method = %event.http_method,
            path = %event.path,
            request_id = %context.aws_request_id,
            "Invoking local handler"
        );

        let request = DispatchedRequest::Handler {
            event: event.clone(),
            context: context.clone(),
        };

        let payload = match invoke(handler.as_ref(), event, context).await {
            Ok(payload) => payload,
            Err(err) => {
                error!("Local handler for '{}' failed: {}", target, err);
                return Err(RequestError::new(
                    ErrorKind::HandlerInvocation,
                    err.message.clone(),
                    config,
                )
                .with_request(request)
                .with_source(err));
            }
        };

        let payload = match inflate(payload) {
            Ok(payload) => payload,
            Err(message) => {
                return Err(RequestError::new(ErrorKind::MalformedPayload, message, config)
                    .with_request(request));
            }
        };

        build_response(&config, request, payload)
    }
}

/// Decompress a gzip-encoded body (base64 of gzip bytes), parsing it as
/// JSON when the content type says so.
fn inflate(mut payload: Payload) -> std::result::Result<Payload, String> {
    let gzipped = payload
        .headers
        .get("content-encoding")
        .is_some_and(|encoding| encoding.eq_ignore_ascii_case("gzip"));
    if !gzipped {
        return Ok(payload);
    }

    let encoded = payload.body.as_str().unwrap_or_default();
    let compressed = STANDARD
        .decode(encoded)
        .map_err(|err| format!("Gzip body is not valid base64: {}", err))?;
    let mut text = String::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_string(&mut text)
        .map_err(|err| format!("Unable to inflate gzip body: {}", err))?;

    let is_json = payload
        .headers
        .get("content-type")
        .is_some_and(|content_type| content_type.contains("application/json"));
    payload.body = if is_json {
        serde_json::from_str(&text).map_err(|err| format!("Gzip body is not valid JSON: {}", err))?
    } else {
        Value::String(text)
    };
    payload.is_base64_encoded = false;
    Ok(payload)
}
