//! Per-request configuration.

use crate::adapter::Adapter;
use crate::function::Handler;
use crate::http::{Body, Headers, Method, ResponseType, StatusCode};
use crate::interceptors::RetryConfig;
use crate::invoke::Invoker;
use crate::resolve::{resolve_optional, ResolveError};
use crate::signing::SigningConfig;
use std::sync::Arc;
use std::time::Duration;

/// Decides whether a status resolves or rejects.
pub type ValidateStatus = Arc<dyn Fn(StatusCode) -> bool + Send + Sync>;

/// Redirect hops followed when nothing else is configured.
pub const DEFAULT_MAX_REDIRECTS: u32 = 5;

/// Accepts 2xx plus the redirects the client follows itself.
pub fn default_validate_status() -> ValidateStatus {
    Arc::new(|status: StatusCode| status.is_success() || status.is_followed_redirect())
}

/// Accepts 2xx only.
pub fn success_only() -> ValidateStatus {
    Arc::new(|status: StatusCode| status.is_success())
}

/// Describes one outbound call.
///
/// `Option` fields left unset fall back to the client defaults when the
/// request is issued.
#[derive(Clone, Default)]
pub struct RequestConfig {
    pub method: Method,
    /// Absolute, relative or `function://` URL.
    pub url: Option<String>,
    pub base_url: Option<String>,
    pub headers: Headers,
    /// Query parameters, merged over any query already in the URL.
    pub params: Vec<(String, String)>,
    pub data: Body,
    pub response_type: Option<ResponseType>,
    pub timeout: Option<Duration>,
    pub max_redirects: Option<u32>,
    pub retry: Option<RetryConfig>,
    /// Serve this request in-process.
    pub handler: Option<Arc<dyn Handler>>,
    /// Remote invocation provider for `function://` targets.
    pub invoker: Option<Arc<dyn Invoker>>,
    /// Bypass transport selection entirely.
    pub adapter: Option<Arc<dyn Adapter>>,
    pub validate_status: Option<ValidateStatus>,
    pub signing: Option<SigningConfig>,
    /// Endpoint for the default remote invocation provider.
    pub function_endpoint: Option<String>,
    pub(crate) retry_count: u32,
    pub(crate) redirect_count: u32,
}

impl RequestConfig {
    /// Create a request for `url`.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self::new(Method::Head, url)
    }

    pub fn options(url: impl Into<String>) -> Self {
        Self::new(Method::Options, url)
    }

    pub fn post(url: impl Into<String>, data: impl Into<Body>) -> Self {
        Self::new(Method::Post, url).data(data)
    }

    pub fn put(url: impl Into<String>, data: impl Into<Body>) -> Self {
        Self::new(Method::Put, url).data(data)
    }

    pub fn patch(url: impl Into<String>, data: impl Into<Body>) -> Self {
        Self::new(Method::Patch, url).data(data)
    }

    /// Set the method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Set the URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the base URL relative URLs resolve against.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set a header, replacing any existing value.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Merge headers, replacing existing values per name.
    pub fn headers(mut self, headers: &Headers) -> Self {
        self.headers.merge(headers);
        self
    }

    /// Add a query parameter. Repeating a key produces a multi-value parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Set the body.
    pub fn data(mut self, data: impl Into<Body>) -> Self {
        self.data = data.into();
        self
    }

    /// Set how the response body is decoded.
    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the redirect budget. `0` disables following.
    pub fn max_redirects(mut self, max_redirects: u32) -> Self {
        self.max_redirects = Some(max_redirects);
        self
    }

    /// Enable retries.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Serve the request with a local handler.
    pub fn handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Use a specific remote invocation provider.
    pub fn invoker(mut self, invoker: Arc<dyn Invoker>) -> Self {
        self.invoker = Some(invoker);
        self
    }

    /// Force a specific transport.
    pub fn adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Set the status validator.
    pub fn validate_status(mut self, validate_status: ValidateStatus) -> Self {
        self.validate_status = Some(validate_status);
        self
    }

    /// Sign the request.
    pub fn signing(mut self, signing: SigningConfig) -> Self {
        self.signing = Some(signing);
        self
    }

    /// Endpoint for the default remote invocation provider.
    pub fn function_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.function_endpoint = Some(endpoint.into());
        self
    }

    /// Re-issues performed so far.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Redirect hops followed so far.
    pub fn redirect_count(&self) -> u32 {
        self.redirect_count
    }

    /// The URL combined with the base URL.
    pub fn full_url(&self) -> Result<Option<String>, ResolveError> {
        resolve_optional(self.url.as_deref(), self.base_url.as_deref())
    }

    /// Fill unset fields from `defaults`. Headers and params merge per name
    /// with this config's values winning.
    pub fn merged_with(self, defaults: &RequestConfig) -> RequestConfig {
        let mut headers = defaults.headers.clone();
        headers.merge(&self.headers);

        let mut params: Vec<(String, String)> = defaults
            .params
            .iter()
            .filter(|(key, _)| !self.params.iter().any(|(k, _)| k == key))
            .cloned()
            .collect();
        params.extend(self.params);

        let data = match self.data {
            Body::Empty => defaults.data.clone(),
            data => data,
        };

        RequestConfig {
            method: self.method,
            url: self.url.or_else(|| defaults.url.clone()),
            base_url: self.base_url.or_else(|| defaults.base_url.clone()),
            headers,
            params,
            data,
            response_type: self.response_type.or(defaults.response_type),
            timeout: self.timeout.or(defaults.timeout),
            max_redirects: self.max_redirects.or(defaults.max_redirects),
            retry: self.retry.or_else(|| defaults.retry.clone()),
            handler: self.handler.or_else(|| defaults.handler.clone()),
            invoker: self.invoker.or_else(|| defaults.invoker.clone()),
            adapter: self.adapter.or_else(|| defaults.adapter.clone()),
            validate_status: self
                .validate_status
                .or_else(|| defaults.validate_status.clone()),
            signing: self.signing.or_else(|| defaults.signing.clone()),
            function_endpoint: self
                .function_endpoint
                .or_else(|| defaults.function_endpoint.clone()),
            retry_count: self.retry_count,
            redirect_count: self.redirect_count,
        }
    }
}

impl std::fmt::Debug for RequestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestConfig")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("base_url", &self.base_url)
            .field("headers", &self.headers)
            .field("params", &self.params)
            .field("data", &self.data)
            .field("response_type", &self.response_type)
            .field("timeout", &self.timeout)
            .field("max_redirects", &self.max_redirects)
            .field("retry", &self.retry)
            .field("handler", &self.handler.is_some())
            .field("invoker", &self.invoker.is_some())
            .field("adapter", &self.adapter.is_some())
            .field("validate_status", &self.validate_status.is_some())
            .field("signing", &self.signing)
            .field("function_endpoint", &self.function_endpoint)
            .field("retry_count", &self.retry_count)
            .field("redirect_count", &self.redirect_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = RequestConfig::get("/a")
            .base_url("function://svc")
            .header("X-Test", "1")
            .param("q", "v")
            .timeout(Duration::from_millis(10))
            .max_redirects(2);

        assert_eq!(config.method, Method::Get);
        assert_eq!(config.url.as_deref(), Some("/a"));
        assert_eq!(config.headers.get("x-test"), Some("1"));
        assert_eq!(config.params, vec![("q".to_string(), "v".to_string())]);
        assert_eq!(config.timeout, Some(Duration::from_millis(10)));
        assert_eq!(config.max_redirects, Some(2));
        assert_eq!(config.full_url().unwrap().as_deref(), Some("function://svc/a"));
    }

    #[test]
    fn test_merge_prefers_request_values() {
        let defaults = RequestConfig::default()
            .base_url("http://example.com")
            .header("Accept", "text/plain")
            .header("X-Default", "yes")
            .param("a", "1")
            .param("b", "2")
            .timeout(Duration::from_secs(1));
        let config = RequestConfig::get("/x")
            .header("accept", "application/json")
            .param("a", "9")
            .merged_with(&defaults);

        assert_eq!(config.base_url.as_deref(), Some("http://example.com"));
        assert_eq!(config.headers.get("Accept"), Some("application/json"));
        assert_eq!(config.headers.get("X-Default"), Some("yes"));
        assert_eq!(
            config.params,
            vec![
                ("b".to_string(), "2".to_string()),
                ("a".to_string(), "9".to_string())
            ]
        );
        assert_eq!(config.timeout, Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_default_validators() {
        let validate = default_validate_status();
        assert!(validate(StatusCode(200)));
        assert!(validate(StatusCode(302)));
        assert!(!validate(StatusCode(304)));
        assert!(!validate(StatusCode(500)));

        let validate = success_only();
        assert!(!validate(StatusCode(301)));
    }
}
