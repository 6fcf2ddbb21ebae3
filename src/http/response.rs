//! Response types shared by every transport.

use crate::adapter::DispatchedRequest;
use crate::client::RequestConfig;
use crate::http::Headers;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(200);
    pub const CREATED: StatusCode = StatusCode(201);
    pub const NO_CONTENT: StatusCode = StatusCode(204);
    pub const MOVED_PERMANENTLY: StatusCode = StatusCode(301);
    pub const FOUND: StatusCode = StatusCode(302);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);
    pub const BAD_GATEWAY: StatusCode = StatusCode(502);
    pub const SERVICE_UNAVAILABLE: StatusCode = StatusCode(503);

    /// Check if the status code indicates success (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.0)
    }

    /// Check if this is one of the redirects the client follows (301/302).
    pub fn is_followed_redirect(&self) -> bool {
        self.0 == 301 || self.0 == 302
    }

    /// Check if the status code indicates a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.0)
    }

    /// Check if the status code indicates a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.0)
    }

    /// The standard reason phrase, or an empty string for unknown codes.
    pub fn reason_phrase(&self) -> &'static str {
        http::StatusCode::from_u16(self.0)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("")
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        StatusCode::OK
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        StatusCode(code)
    }
}

impl From<StatusCode> for u16 {
    fn from(code: StatusCode) -> Self {
        code.0
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    Text(String),
    Binary(Bytes),
    Json(serde_json::Value),
}

impl Data {
    /// The body as text, if it was decoded as text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Data::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The body as raw bytes regardless of how it was decoded.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Data::Text(text) => Bytes::from(text.clone()),
            Data::Binary(bytes) => bytes.clone(),
            Data::Json(value) => Bytes::from(value.to_string()),
        }
    }
}

impl Default for Data {
    fn default() -> Self {
        Data::Text(String::new())
    }
}

impl PartialEq<&str> for Data {
    fn eq(&self, other: &&str) -> bool {
        self.as_text() == Some(*other)
    }
}

/// A response produced by any transport.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code.
    pub status: StatusCode,
    /// Reason phrase for `status`.
    pub status_text: String,
    /// Response headers.
    pub headers: Headers,
    /// Decoded body.
    pub data: Data,
    /// The configuration the request was dispatched with.
    pub config: RequestConfig,
    /// What was actually sent to the transport.
    pub request: DispatchedRequest,
}

impl Response {
    /// Get a header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Get the body as text if present.
    pub fn text(&self) -> Option<&str> {
        self.data.as_text()
    }

    /// Parse the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match &self.data {
            Data::Json(value) => serde_json::from_value(value.clone()),
            other => serde_json::from_slice(&other.to_bytes()),
        }
    }
}
