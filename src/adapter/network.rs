//! Plain HTTP transport.

use crate::adapter::{Adapter, DispatchedRequest};
use crate::client::RequestConfig;
use crate::codec::settle;
use crate::error::{ErrorKind, RequestError, Result, ABORTED};
use crate::http::{Data, Headers, Response, ResponseType, StatusCode};
use async_trait::async_trait;
use reqwest::redirect::Policy;
use tracing::{debug, error};
use url::Url;

/// Sends requests over the network with `reqwest`.
///
/// Redirects are never followed here; the client follows them itself so
/// that hops into `function://` targets work.
#[derive(Debug, Clone)]
pub struct NetworkAdapter {
    client: reqwest::Client,
}

impl NetworkAdapter {
    pub fn new() -> std::result::Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().redirect(Policy::none()).build()?;
        Ok(Self { client })
    }

    /// Use an existing client. It should not follow redirects.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Adapter for NetworkAdapter {
    async fn dispatch(&self, config: RequestConfig) -> Result<Response> {
        let invalid = |message: String, config: &RequestConfig| {
            RequestError::new(ErrorKind::InvalidUrl, message, config.clone())
        };

        let target = match config.full_url() {
            Ok(Some(url)) => url,
            Ok(None) => return Err(invalid("No URL to request".to_string(), &config)),
            Err(err) => return Err(invalid(err.to_string(), &config).with_source(err)),
        };
        let mut url = match Url::parse(&target) {
            Ok(url) => url,
            Err(err) => {
                return Err(invalid(format!("Unable to request '{}': {}", target, err), &config)
                    .with_source(err))
            }
        };
        if !config.params.is_empty() {
            let mut query = url.query_pairs_mut();
            for (key, value) in &config.params {
                query.append_pair(key, value);
            }
        }

        let request = DispatchedRequest::Http {
            method: config.method,
            url: url.to_string(),
            headers: config.headers.clone(),
        };

        let mut builder = self.client.request(config.method.into(), url.clone());
        for (name, value) in config.headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if !config.data.is_empty() {
            builder = builder.body(config.data.to_bytes());
        }

        debug!(method = %config.method, url = %url, "Sending request");

        let network_error = |err: reqwest::Error, config: &RequestConfig, request: &DispatchedRequest| {
            error!("Request to {} failed: {}", url, err);
            let mut failure = RequestError::new(ErrorKind::Network, err.to_string(), config.clone())
                .with_request(request.clone());
            if err.is_timeout() {
                failure = failure.with_code(ABORTED);
            }
            failure.with_source(err)
        };

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => return Err(network_error(err, &config, &request)),
        };

        let status = StatusCode(response.status().as_u16());
        let headers: Headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|value| (name.as_str(), value)))
            .collect();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(err) => return Err(network_error(err, &config, &request)),
        };

        let is_json = headers
            .get("content-type")
            .is_some_and(|content_type| content_type.contains("application/json"));
        let data = match config.response_type {
            None => match is_json.then(|| serde_json::from_slice::<serde_json::Value>(&body).ok()).flatten() {
                Some(value) => Data::Json(value),
                None => Data::Text(String::from_utf8_lossy(&body).into_owned()),
            },
            Some(ResponseType::Json) => match serde_json::from_slice::<serde_json::Value>(&body) {
                Ok(value) => Data::Json(value),
                Err(_) => Data::Text(String::from_utf8_lossy(&body).into_owned()),
            },
            Some(ResponseType::Text) => Data::Text(String::from_utf8_lossy(&body).into_owned()),
            Some(ResponseType::ArrayBuffer) => Data::Binary(body),
            Some(other) => {
                return Err(RequestError::new(
                    ErrorKind::UnsupportedResponseType,
                    format!("Unhandled responseType requested: {}", other),
                    config,
                )
                .with_request(request))
            }
        };

        settle(Response {
            status,
            status_text: status.reason_phrase().to_string(),
            headers,
            data,
            config,
            request,
        })
    }
}
