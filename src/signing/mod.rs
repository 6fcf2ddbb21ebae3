//! Request signing.
//!
//! When a request carries a [`SigningConfig`], the [`SigningInterceptor`]
//! runs as the last request interceptor and adds signature headers for the
//! final URL, headers and body.

mod credentials;
mod host;
pub mod sigv4;

pub use credentials::{
    Credentials, CredentialsError, CredentialsProvider, EnvCredentialsProvider,
    StaticCredentialsProvider,
};
pub use host::{match_host, HostCodes};

use crate::client::RequestConfig;
use crate::error::{ErrorKind, RequestError, Result};
use crate::interceptors::RequestInterceptor;
use crate::resolve::FunctionUrl;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// How to sign a request. Unset service and region are inferred from the
/// target host.
#[derive(Clone)]
pub struct SigningConfig {
    pub service: Option<String>,
    pub region: Option<String>,
    /// Defaults to [`EnvCredentialsProvider`].
    pub credentials: Option<Arc<dyn CredentialsProvider>>,
    pub uri_escape_path: bool,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            service: None,
            region: None,
            credentials: None,
            uri_escape_path: true,
        }
    }
}

impl SigningConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn credentials(mut self, provider: Arc<dyn CredentialsProvider>) -> Self {
        self.credentials = Some(provider);
        self
    }

    pub fn uri_escape_path(mut self, uri_escape_path: bool) -> Self {
        self.uri_escape_path = uri_escape_path;
        self
    }
}

impl std::fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningConfig")
            .field("service", &self.service)
            .field("region", &self.region)
            .field("credentials", &self.credentials.is_some())
            .field("uri_escape_path", &self.uri_escape_path)
            .finish()
    }
}

/// Where a signed request goes.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SigningTarget {
    host: String,
    path: String,
    query: Vec<(String, String)>,
}

impl SigningTarget {
    /// Function URLs sign as `name` + path; the qualifier is not part of
    /// the signable host.
    fn parse(url: &str) -> std::result::Result<Self, String> {
        if let Some(function) = FunctionUrl::parse(url) {
            let (path, query) = match function.path.split_once('?') {
                Some((path, query)) => (path.to_string(), decode_query(query)),
                None => (function.path.clone(), Vec::new()),
            };
            return Ok(Self {
                host: function.name,
                path,
                query,
            });
        }

        let parsed = Url::parse(url).map_err(|err| format!("Unable to sign '{}': {}", url, err))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| format!("Unable to sign '{}': no host", url))?;
        let host = match parsed.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        Ok(Self {
            host,
            path: parsed.path().to_string(),
            query: parsed.query_pairs().into_owned().collect(),
        })
    }
}

fn decode_query(query: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(query.as_bytes()).into_owned().collect()
}

/// Adds signature headers to requests that carry a [`SigningConfig`].
#[derive(Debug, Default)]
pub struct SigningInterceptor;

#[async_trait]
impl RequestInterceptor for SigningInterceptor {
    async fn intercept(&self, mut config: RequestConfig) -> Result<RequestConfig> {
        let Some(signing) = config.signing.clone() else {
            return Ok(config);
        };

        let fail = |message: String, config: &RequestConfig| {
            RequestError::new(ErrorKind::Signing, message, config.clone())
        };

        let url = match config.full_url() {
            Ok(Some(url)) => url,
            Ok(None) => return Err(fail("Unable to sign a request without a URL".to_string(), &config)),
            Err(err) => return Err(fail(err.to_string(), &config).with_source(err)),
        };
        let mut target = SigningTarget::parse(&url).map_err(|message| fail(message, &config))?;
        target.query.extend(config.params.iter().cloned());

        let codes = match_host(&target.host);
        let service = signing.service.unwrap_or(codes.service);
        let region = signing.region.unwrap_or(codes.region);

        let provider: Arc<dyn CredentialsProvider> = signing
            .credentials
            .unwrap_or_else(|| Arc::new(EnvCredentialsProvider));
        let credentials = match provider.credentials().await {
            Ok(credentials) => credentials,
            Err(err) => return Err(fail(err.to_string(), &config).with_source(err)),
        };

        debug!(service = %service, region = %region, host = %target.host, "Signing request");

        let body = config.data.to_bytes();
        let signed = sigv4::sign(
            &sigv4::SignableRequest {
                method: config.method.as_str(),
                host: &target.host,
                path: &target.path,
                query: &target.query,
                headers: &config.headers,
                body: &body,
            },
            &sigv4::SigningParams {
                credentials: &credentials,
                region: &region,
                service: &service,
                time: Utc::now(),
                uri_escape_path: signing.uri_escape_path,
            },
        );
        config.headers.merge(&signed);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn static_credentials() -> Arc<dyn CredentialsProvider> {
        Arc::new(StaticCredentialsProvider(Credentials::new("AKID", "SECRET")))
    }

    #[test]
    fn test_function_target_drops_qualifier() {
        let target = SigningTarget::parse("function://svc:deployed/some/path?a=1").unwrap();
        assert_eq!(target.host, "svc");
        assert_eq!(target.path, "/some/path");
        assert_eq!(target.query, vec![("a".to_string(), "1".to_string())]);
    }

    #[test]
    fn test_http_target() {
        let target = SigningTarget::parse("https://lambda.us-west-2.amazonaws.com:8443/x?b=2").unwrap();
        assert_eq!(target.host, "lambda.us-west-2.amazonaws.com:8443");
        assert_eq!(target.path, "/x");
    }

    #[tokio::test]
    async fn test_unsigned_requests_pass_through() {
        let config = RequestConfig::get("http://example.com/");
        let config = SigningInterceptor.intercept(config).await.unwrap();
        assert!(!config.headers.contains("authorization"));
    }

    #[tokio::test]
    async fn test_signs_with_inferred_codes() {
        let config = RequestConfig::get("https://execute-api.us-west-2.amazonaws.com/prod")
            .signing(SigningConfig::new().credentials(static_credentials()));
        let config = SigningInterceptor.intercept(config).await.unwrap();

        let authorization = config.headers.get("authorization").unwrap();
        assert!(authorization.starts_with("AWS4-HMAC-SHA256 Credential=AKID/"));
        assert!(authorization.contains("/us-west-2/execute-api/aws4_request"));
        assert_eq!(config.headers.get("host"), Some("execute-api.us-west-2.amazonaws.com"));
        assert!(config.headers.contains("x-amz-date"));
    }

    #[tokio::test]
    async fn test_explicit_codes_win() {
        let config = RequestConfig::get("/path")
            .base_url("function://svc:v1")
            .signing(
                SigningConfig::new()
                    .service("lambda")
                    .region("eu-west-1")
                    .credentials(static_credentials()),
            );
        let config = SigningInterceptor.intercept(config).await.unwrap();
        let authorization = config.headers.get("authorization").unwrap();
        assert!(authorization.contains("/eu-west-1/lambda/aws4_request"));
        assert_eq!(config.headers.get("host"), Some("svc"));
    }

    #[tokio::test]
    async fn test_missing_url_fails() {
        let config = RequestConfig::default().signing(SigningConfig::new().credentials(static_credentials()));
        let err = SigningInterceptor.intercept(config).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Signing);
    }
}
