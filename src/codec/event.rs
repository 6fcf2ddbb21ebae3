//! Request → invocation event.

use crate::client::RequestConfig;
use crate::http::Body;
use crate::resolve::FunctionUrl;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;
use uuid::Uuid;

/// Relative targets are parsed against this origin.
const FAKE_ORIGIN: &str = "http://fake";

/// A gateway-style proxy event, the input every function handler receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationEvent {
    pub body: String,
    /// One value per header name; repeated headers are joined with `", "`.
    pub headers: HashMap<String, String>,
    /// Every header value, split on commas.
    pub multi_value_headers: HashMap<String, Vec<String>>,
    pub http_method: String,
    pub path: String,
    /// Query keys with exactly one value.
    pub query_string_parameters: HashMap<String, String>,
    /// Query keys with more than one value; `None` when there are none.
    pub multi_value_query_string_parameters: Option<HashMap<String, Vec<String>>>,
    pub is_base64_encoded: bool,
    pub path_parameters: Option<HashMap<String, String>>,
    pub stage_variables: Option<HashMap<String, String>>,
    pub resource: String,
    pub request_context: RequestContext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub stage: String,
    pub request_id: String,
    pub api_id: String,
    pub protocol: String,
    pub account_id: String,
    pub authorizer: serde_json::Map<String, serde_json::Value>,
    pub resource_id: String,
    pub request_time: String,
    /// Seconds since the epoch.
    pub request_time_epoch: f64,
    pub resource_path: String,
    pub http_method: String,
    pub path: String,
    pub identity: Identity,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub access_key: Option<String>,
    pub account_id: Option<String>,
    pub api_key: Option<String>,
    pub api_key_id: Option<String>,
    pub caller: Option<String>,
    pub client_cert: Option<serde_json::Value>,
    pub cognito_authentication_provider: Option<String>,
    pub cognito_authentication_type: Option<String>,
    pub cognito_identity_id: Option<String>,
    pub cognito_identity_pool_id: Option<String>,
    pub principal_org_id: Option<String>,
    pub source_ip: String,
    pub user: Option<String>,
    pub user_agent: Option<String>,
    pub user_arn: Option<String>,
}

impl RequestContext {
    fn new(http_method: &str) -> Self {
        let now = Utc::now();
        Self {
            stage: String::new(),
            request_id: Uuid::new_v4().to_string(),
            api_id: "alpha".to_string(),
            protocol: "http".to_string(),
            account_id: String::new(),
            authorizer: serde_json::Map::new(),
            resource_id: String::new(),
            request_time: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            request_time_epoch: now.timestamp_millis() as f64 / 1e3,
            resource_path: String::new(),
            http_method: http_method.to_string(),
            path: String::new(),
            identity: Identity {
                source_ip: "127.0.0.1".to_string(),
                ..Identity::default()
            },
        }
    }
}

/// Build the invocation event for a request.
///
/// `relative_url` is the path and query to deliver; it defaults to the
/// request URL. Function URLs contribute only their path.
pub fn build_event(
    config: &RequestConfig,
    relative_url: Option<&str>,
) -> Result<InvocationEvent, url::ParseError> {
    let target = relative_url.or(config.url.as_deref()).unwrap_or("/");
    let function_path;
    let target = match FunctionUrl::parse(target) {
        Some(function) => {
            function_path = function.path;
            function_path.as_str()
        }
        None => target,
    };
    let parsed = Url::parse(FAKE_ORIGIN)?.join(target)?;

    let mut params = group_pairs(parsed.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())));
    // Explicit params replace query keys of the same name.
    for (key, values) in group_pairs(config.params.iter().cloned()) {
        match params.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = values,
            None => params.push((key, values)),
        }
    }

    let mut single = HashMap::new();
    let mut multi: Option<HashMap<String, Vec<String>>> = None;
    for (key, mut values) in params {
        if values.len() > 1 {
            multi.get_or_insert_with(HashMap::new).insert(key, values);
        } else if let Some(value) = values.pop() {
            single.insert(key, value);
        }
    }

    let (body, is_base64_encoded) = match &config.data {
        Body::Empty => (String::new(), false),
        Body::Text(text) => (text.clone(), false),
        Body::Json(value) => (value.to_string(), false),
        Body::Bytes(bytes) => (STANDARD.encode(bytes), true),
    };

    let http_method = config.method.as_str().to_uppercase();

    Ok(InvocationEvent {
        body,
        headers: config.headers.to_single_value_map(),
        multi_value_headers: config.headers.to_multi_value_map(),
        request_context: RequestContext::new(&http_method),
        http_method,
        path: parsed.path().to_string(),
        query_string_parameters: single,
        multi_value_query_string_parameters: multi,
        is_base64_encoded,
        path_parameters: None,
        stage_variables: None,
        resource: String::new(),
    })
}

/// Group pairs by key, keeping first-seen key order.
fn group_pairs(pairs: impl Iterator<Item = (String, String)>) -> Vec<(String, Vec<String>)> {
    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for (key, value) in pairs {
        match grouped.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => grouped.push((key, vec![value])),
        }
    }
    grouped
}
