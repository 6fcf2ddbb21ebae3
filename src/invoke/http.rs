//! Invocation over the provider's REST invoke API.

use crate::http::Headers;
use crate::invoke::{InvocationRequest, InvocationResponse, InvokeError, Invoker, InvokerOptions};
use crate::signing::sigv4::{self, SignableRequest, SigningParams};
use crate::signing::{CredentialsProvider, EnvCredentialsProvider};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;
use url::Url;

const API_VERSION: &str = "2015-03-31";
const SIGNING_SERVICE: &str = "lambda";

/// Invokes functions with signed `POST .../functions/{name}/invocations`
/// requests.
///
/// Copies made with [`HttpInvoker::with_options`] share one connection pool.
pub struct HttpInvoker {
    client: reqwest::Client,
    options: InvokerOptions,
    credentials: Arc<dyn CredentialsProvider>,
}

impl HttpInvoker {
    /// Create an invoker. `options.timeout` bounds each request, connecting
    /// included.
    pub fn new(options: InvokerOptions) -> Result<Self, InvokeError> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            options,
            credentials: Arc::new(EnvCredentialsProvider),
        })
    }

    /// The same transport and credentials with different options.
    pub fn with_options(&self, options: InvokerOptions) -> Self {
        Self {
            client: self.client.clone(),
            options,
            credentials: self.credentials.clone(),
        }
    }

    pub fn options(&self) -> &InvokerOptions {
        &self.options
    }

    /// Sign with credentials from `provider`.
    pub fn with_credentials(mut self, provider: Arc<dyn CredentialsProvider>) -> Self {
        self.credentials = provider;
        self
    }

    /// The invoke URL for `request`.
    fn invoke_url(&self, request: &InvocationRequest) -> Result<Url, InvokeError> {
        let endpoint = self.options.resolved_endpoint();
        let mut url = Url::parse(&endpoint)
            .map_err(|err| InvokeError::InvalidRequest(format!("Invalid endpoint '{}': {}", endpoint, err)))?;
        url.path_segments_mut()
            .map_err(|_| InvokeError::InvalidRequest(format!("Invalid endpoint '{}'", endpoint)))?
            .pop_if_empty()
            .extend([API_VERSION, "functions", request.function_name.as_str(), "invocations"]);
        if let Some(qualifier) = &request.qualifier {
            url.query_pairs_mut().append_pair("Qualifier", qualifier);
        }
        Ok(url)
    }
}

impl std::fmt::Debug for HttpInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpInvoker")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Invoker for HttpInvoker {
    async fn invoke(
        &self,
        request: InvocationRequest,
        abort: tokio_util::sync::CancellationToken,
    ) -> Result<InvocationResponse, InvokeError> {
        let url = self.invoke_url(&request)?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(InvokeError::InvalidRequest(format!("No host in '{}'", url))),
        };

        let mut headers = Headers::new();
        headers.insert("Content-Type", "application/json");
        headers.insert("X-Amz-Invocation-Type", request.invocation_type.as_str());

        let credentials = self
            .credentials
            .credentials()
            .await
            .map_err(|err| InvokeError::InvalidRequest(err.to_string()))?;
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let signed = sigv4::sign(
            &SignableRequest {
                method: "POST",
                host: &host,
                path: url.path(),
                query: &query,
                headers: &headers,
                body: request.payload.as_bytes(),
            },
            &SigningParams {
                credentials: &credentials,
                region: self.options.resolved_region(),
                service: SIGNING_SERVICE,
                time: Utc::now(),
                uri_escape_path: true,
            },
        );
        headers.merge(&signed);

        debug!(function = %request.function_name, url = %url, "Sending invocation");

        let mut builder = self.client.post(url).body(request.payload);
        if let Some(timeout) = self.options.timeout {
            builder = builder.timeout(timeout);
        }
        for (name, value) in headers.iter() {
            builder = builder.header(name, value);
        }

        let response = tokio::select! {
            response = builder.send() => response?,
            _ = abort.cancelled() => return Err(InvokeError::Aborted),
        };

        let status_code = response.status().as_u16();
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        let function_error = header("X-Amz-Function-Error");
        let executed_version = header("X-Amz-Executed-Version");

        let payload = tokio::select! {
            body = response.text() => body?,
            _ = abort.cancelled() => return Err(InvokeError::Aborted),
        };

        if !(200..300).contains(&status_code) && function_error.is_none() {
            return Err(InvokeError::Service {
                status: status_code,
                message: payload,
            });
        }

        Ok(InvocationResponse {
            status_code,
            payload: Some(payload),
            function_error,
            executed_version,
        })
    }
}
