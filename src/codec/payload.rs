//! Invocation result → response.

use crate::adapter::DispatchedRequest;
use crate::client::RequestConfig;
use crate::error::{ErrorKind, RequestError, Result};
use crate::http::{Data, Headers, Response, ResponseType, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The result a handler or remote function returns.
///
/// `statusCode` is optional on the wire so that `{errorMessage}` failure
/// payloads deserialize too; [`build_response`] rejects a payload without one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_base64_encoded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl Payload {
    /// An empty-bodied payload with the given status.
    pub fn new(status: u16) -> Self {
        Self {
            body: Value::String(String::new()),
            status_code: Some(status),
            ..Self::default()
        }
    }

    /// A text payload.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status).with_body(Value::String(body.into()))
    }

    /// A JSON payload: the value is serialized into the body and the content
    /// type is set.
    pub fn json(status: u16, body: &Value) -> Self {
        Self::text(status, body.to_string()).with_header("Content-Type", "application/json")
    }

    /// A binary payload, base64-encoded on the wire.
    pub fn binary(status: u16, body: impl AsRef<[u8]>) -> Self {
        let mut payload = Self::text(status, STANDARD.encode(body));
        payload.is_base64_encoded = true;
        payload
    }

    /// A redirect to `location`.
    pub fn redirect(status: u16, location: impl Into<String>) -> Self {
        Self::new(status).with_header("Location", location)
    }

    /// Set the body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Set a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Turn an invocation payload into a response, decoding the body per the
/// requested response type, then validate its status.
pub fn build_response(
    config: &RequestConfig,
    request: DispatchedRequest,
    payload: Payload,
) -> Result<Response> {
    let fail = |kind: ErrorKind, message: String| {
        RequestError::new(kind, message, config.clone()).with_request(request.clone())
    };

    let Some(status) = payload.status_code else {
        return Err(fail(
            ErrorKind::MalformedPayload,
            "Invocation result did not include a statusCode".to_string(),
        ));
    };

    let data = payload_to_data(config.response_type, &payload).map_err(|(kind, message)| fail(kind, message))?;

    let status = StatusCode(status);
    let response = Response {
        status,
        status_text: status.reason_phrase().to_string(),
        headers: payload.headers,
        data,
        config: config.clone(),
        request,
    };

    settle(response)
}

/// Reject a response whose status the config's validator refuses.
pub fn settle(response: Response) -> Result<Response> {
    match &response.config.validate_status {
        Some(validate) if !validate(response.status) => Err(RequestError::status(response)),
        _ => Ok(response),
    }
}

fn payload_to_data(
    response_type: Option<ResponseType>,
    payload: &Payload,
) -> std::result::Result<Data, (ErrorKind, String)> {
    let decoded = if payload.is_base64_encoded {
        let encoded = payload.body.as_str().unwrap_or_default();
        let bytes = STANDARD.decode(encoded).map_err(|err| {
            (
                ErrorKind::MalformedPayload,
                format!("Invocation result body is not valid base64: {}", err),
            )
        })?;
        Some(Bytes::from(bytes))
    } else {
        None
    };

    match response_type {
        None | Some(ResponseType::Text) => Ok(match (decoded, &payload.body) {
            (Some(bytes), _) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => Data::Text(text),
                Err(_) => Data::Binary(bytes),
            },
            (None, Value::String(text)) => Data::Text(text.clone()),
            (None, Value::Null) => Data::Text(String::new()),
            (None, other) => Data::Json(other.clone()),
        }),
        Some(ResponseType::ArrayBuffer) => Ok(Data::Binary(match (decoded, &payload.body) {
            (Some(bytes), _) => bytes,
            (None, Value::String(text)) => Bytes::from(text.clone().into_bytes()),
            (None, Value::Null) => Bytes::new(),
            (None, other) => Bytes::from(other.to_string().into_bytes()),
        })),
        Some(other) => Err((
            ErrorKind::UnsupportedResponseType,
            format!("Unhandled responseType requested: {}", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RequestConfig;
    use std::sync::Arc;

    fn request() -> DispatchedRequest {
        DispatchedRequest::Http {
            method: crate::http::Method::Get,
            url: "/".to_string(),
            headers: Headers::new(),
        }
    }

    #[test]
    fn test_text_body() {
        let config = RequestConfig::get("/");
        let response = build_response(&config, request(), Payload::text(200, "hi")).unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.status_text, "OK");
        assert_eq!(response.data, "hi");
    }

    #[test]
    fn test_arraybuffer_body() {
        let config = RequestConfig::get("/").response_type(ResponseType::ArrayBuffer);
        let response = build_response(&config, request(), Payload::text(200, "hi")).unwrap();
        assert_eq!(response.data, Data::Binary(Bytes::from_static(b"hi")));
    }

    #[test]
    fn test_unsupported_response_type() {
        let config = RequestConfig::get("/").response_type(ResponseType::Stream);
        let err = build_response(&config, request(), Payload::text(200, "hi")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedResponseType);
        assert_eq!(err.message, "Unhandled responseType requested: stream");
    }

    #[test]
    fn test_base64_body_is_decoded() {
        let config = RequestConfig::get("/").response_type(ResponseType::ArrayBuffer);
        let payload = Payload::binary(200, [0u8, 159, 146, 150]);
        let response = build_response(&config, request(), payload).unwrap();
        assert_eq!(response.data, Data::Binary(Bytes::from_static(&[0, 159, 146, 150])));
    }

    #[test]
    fn test_missing_status_code_is_malformed() {
        let config = RequestConfig::get("/");
        let payload: Payload = serde_json::from_str(r#"{"body": "x"}"#).unwrap();
        let err = build_response(&config, request(), payload).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedPayload);
    }

    #[test]
    fn test_validate_status_rejects_with_response() {
        let config = RequestConfig::get("/").validate_status(Arc::new(|status: StatusCode| status.0 < 400));
        let err = build_response(&config, request(), Payload::text(404, "nope")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::StatusValidation);
        assert_eq!(err.message, "Request failed with status code 404");
        let response = err.response.unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.data, "nope");
    }

    #[test]
    fn test_without_validator_any_status_resolves() {
        let config = RequestConfig::get("/");
        let response = build_response(&config, request(), Payload::text(500, "err")).unwrap();
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_payload_wire_shape() {
        let payload: Payload = serde_json::from_str(
            r#"{"statusCode": 302, "headers": {"Location": "/other"}, "body": ""}"#,
        )
        .unwrap();
        assert_eq!(payload.status_code, Some(302));
        assert_eq!(payload.headers.get("location"), Some("/other"));

        let error: Payload = serde_json::from_str(r#"{"errorMessage": "boom"}"#).unwrap();
        assert_eq!(error.error_message.as_deref(), Some("boom"));
        assert_eq!(error.status_code, None);
    }
}
