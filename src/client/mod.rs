//! The client: default configuration, transport selection and the
//! redirect/retry loop.

mod config;

pub use config::{
    default_validate_status, success_only, RequestConfig, ValidateStatus, DEFAULT_MAX_REDIRECTS,
};

use crate::adapter::{
    Adapter, AdapterChain, AdapterEntry, LocalHandlerAdapter, NetworkAdapter, Predicate,
    RemoteInvocationAdapter,
};
use crate::error::{BuildError, Result};
use crate::function::{Handler, HandlerRegistry};
use crate::http::{Body, Headers, Response};
use crate::interceptors::redirect::next_hop;
use crate::interceptors::retry::next_retry;
use crate::interceptors::{RequestInterceptor, RetryConfig};
use crate::invoke::Invoker;
use crate::signing::{SigningConfig, SigningInterceptor};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Priority of the in-process handler transport.
pub const LOCAL_PRIORITY: u32 = 30;
/// Priority of the remote invocation transport.
pub const REMOTE_PRIORITY: u32 = 20;

/// Builder for [`Client`].
///
/// # Example
///
/// ```rust,no_run
/// use alpha::prelude::*;
/// use std::time::Duration;
///
/// # fn main() -> Result<(), alpha::error::BuildError> {
/// let client = Client::builder()
///     .base_url("function://user-service:deployed")
///     .timeout(Duration::from_secs(3))
///     .retry(RetryConfig::default())
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    defaults: RequestConfig,
    ignore_redirects: bool,
    registry: Option<Arc<HandlerRegistry>>,
    interceptors: Vec<Arc<dyn RequestInterceptor>>,
    adapters: Vec<AdapterEntry>,
    network: Option<Arc<dyn Adapter>>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            defaults: RequestConfig::default(),
            ignore_redirects: false,
            registry: None,
            interceptors: Vec::new(),
            adapters: Vec::new(),
            network: None,
        }
    }
}

impl ClientBuilder {
    /// Create a builder with no defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL relative request URLs resolve against.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.defaults.base_url = Some(base_url.into());
        self
    }

    /// Serve every relative or `function://` request with this handler.
    pub fn handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.defaults.handler = Some(handler);
        self
    }

    /// Remote invocation provider for `function://` targets.
    pub fn invoker(mut self, invoker: Arc<dyn Invoker>) -> Self {
        self.defaults.invoker = Some(invoker);
        self
    }

    /// Endpoint for the default remote invocation provider.
    pub fn function_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.defaults.function_endpoint = Some(endpoint.into());
        self
    }

    /// Add a default header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.headers.insert(name, value);
        self
    }

    /// Merge default headers.
    pub fn headers(mut self, headers: &Headers) -> Self {
        self.defaults.headers.merge(headers);
        self
    }

    /// Set the default timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.defaults.timeout = Some(timeout);
        self
    }

    /// Retry failed requests by default.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.defaults.retry = Some(retry);
        self
    }

    /// Sign every request by default.
    pub fn signing(mut self, signing: SigningConfig) -> Self {
        self.defaults.signing = Some(signing);
        self
    }

    /// Set the default redirect budget.
    pub fn max_redirects(mut self, max_redirects: u32) -> Self {
        self.defaults.max_redirects = Some(max_redirects);
        self
    }

    /// Surface 301/302 responses as status errors instead of following them.
    /// Only applies when no validator is set.
    pub fn ignore_redirects(mut self, ignore_redirects: bool) -> Self {
        self.ignore_redirects = ignore_redirects;
        self
    }

    /// Set the default status validator.
    pub fn validate_status(mut self, validate_status: ValidateStatus) -> Self {
        self.defaults.validate_status = Some(validate_status);
        self
    }

    /// Share a registry of named local handlers.
    pub fn registry(mut self, registry: Arc<HandlerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Add a request interceptor. Interceptors run in the order added,
    /// before signing.
    pub fn request_interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Add a transport to the selection chain.
    pub fn adapter(mut self, entry: AdapterEntry) -> Self {
        self.adapters.push(entry);
        self
    }

    /// Replace the fallback network transport.
    pub fn network_adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.network = Some(adapter);
        self
    }

    /// Build the client.
    pub fn build(self) -> std::result::Result<Client, BuildError> {
        let mut defaults = self.defaults;
        if defaults.validate_status.is_none() {
            defaults.validate_status = Some(if self.ignore_redirects {
                success_only()
            } else {
                default_validate_status()
            });
        }

        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(HandlerRegistry::new()));
        let fallback: Arc<dyn Adapter> = match self.network {
            Some(adapter) => adapter,
            None => Arc::new(NetworkAdapter::new()?),
        };

        let local = Arc::new(LocalHandlerAdapter::new(registry.clone()));
        let local_applies: Predicate = {
            let local = local.clone();
            Arc::new(move |config: &RequestConfig| local.applies(config))
        };
        let remote_applies: Predicate = Arc::new(RemoteInvocationAdapter::applies);

        let mut chain = AdapterChain::new(fallback)
            .with(AdapterEntry::new("local", local_applies, local).priority(LOCAL_PRIORITY))
            .with(
                AdapterEntry::new(
                    "remote",
                    remote_applies,
                    Arc::new(RemoteInvocationAdapter::from_env()?),
                )
                .priority(REMOTE_PRIORITY),
            );
        for entry in self.adapters {
            chain.add(entry);
        }

        debug!(
            adapters = ?chain.list().iter().map(|entry| entry.name).collect::<Vec<_>>(),
            "Client built"
        );

        Ok(Client {
            inner: Arc::new(ClientInner {
                defaults,
                chain,
                interceptors: self.interceptors,
                signer: SigningInterceptor,
                registry,
            }),
        })
    }
}

struct ClientInner {
    defaults: RequestConfig,
    chain: AdapterChain,
    interceptors: Vec<Arc<dyn RequestInterceptor>>,
    signer: SigningInterceptor,
    registry: Arc<HandlerRegistry>,
}

/// Issues requests over the network or into function handlers, with the
/// same request and response shapes for every transport.
///
/// Cheap to clone; clones share defaults, transports and the registry.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// A client with no defaults.
    pub fn new() -> std::result::Result<Self, BuildError> {
        ClientBuilder::new().build()
    }

    /// A client resolving relative URLs against `base_url`.
    pub fn with_base_url(base_url: impl Into<String>) -> std::result::Result<Self, BuildError> {
        ClientBuilder::new().base_url(base_url).build()
    }

    /// A client serving relative and `function://` requests with `handler`.
    pub fn with_handler(handler: Arc<dyn Handler>) -> std::result::Result<Self, BuildError> {
        ClientBuilder::new().handler(handler).build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The registry of named local handlers.
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.inner.registry
    }

    /// Client-wide defaults merged into every request.
    pub fn defaults(&self) -> &RequestConfig {
        &self.inner.defaults
    }

    /// Issue a request, following redirects and retrying per its config.
    ///
    /// Attempts for one request run strictly one after another. The retry
    /// count carries across redirect hops.
    pub async fn request(&self, config: RequestConfig) -> Result<Response> {
        let mut config = config.merged_with(&self.inner.defaults);

        loop {
            match self.dispatch(config.clone()).await {
                Ok(response) => match next_hop(&config, &response)? {
                    Some(next) => config = next,
                    None => return Ok(response),
                },
                Err(err) => {
                    let Some(delay) = next_retry(&config, &err) else {
                        return Err(err);
                    };
                    config.retry_count += 1;
                    warn!(
                        attempt = config.retry_count,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying request after error: {}",
                        err
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// One attempt: interceptors, signing, then the selected transport.
    async fn dispatch(&self, config: RequestConfig) -> Result<Response> {
        let mut config = prepare(config);
        for interceptor in &self.inner.interceptors {
            config = interceptor.intercept(config).await?;
        }
        let config = self.inner.signer.intercept(config).await?;

        let (adapter_name, adapter) = self.inner.chain.select(&config);
        debug!(
            adapter = adapter_name,
            method = %config.method,
            url = ?config.full_url().ok().flatten(),
            retry = config.retry_count,
            redirect = config.redirect_count,
            "Dispatching request"
        );
        adapter.dispatch(config).await
    }

    pub async fn get(&self, url: impl Into<String>) -> Result<Response> {
        self.request(RequestConfig::get(url)).await
    }

    pub async fn delete(&self, url: impl Into<String>) -> Result<Response> {
        self.request(RequestConfig::delete(url)).await
    }

    pub async fn head(&self, url: impl Into<String>) -> Result<Response> {
        self.request(RequestConfig::head(url)).await
    }

    pub async fn options(&self, url: impl Into<String>) -> Result<Response> {
        self.request(RequestConfig::options(url)).await
    }

    pub async fn post(&self, url: impl Into<String>, data: impl Into<Body>) -> Result<Response> {
        self.request(RequestConfig::post(url, data)).await
    }

    pub async fn put(&self, url: impl Into<String>, data: impl Into<Body>) -> Result<Response> {
        self.request(RequestConfig::put(url, data)).await
    }

    pub async fn patch(&self, url: impl Into<String>, data: impl Into<Body>) -> Result<Response> {
        self.request(RequestConfig::patch(url, data)).await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("defaults", &self.inner.defaults)
            .field("interceptors", &self.inner.interceptors.len())
            .field("handlers", &self.inner.registry.list())
            .finish()
    }
}

/// JSON bodies get a JSON content type unless one was set.
fn prepare(mut config: RequestConfig) -> RequestConfig {
    if matches!(config.data, Body::Json(_)) && !config.headers.contains("content-type") {
        config.headers.insert("Content-Type", "application/json");
    }
    config
}
