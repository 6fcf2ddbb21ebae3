//! Integration tests for the alpha client.

use alpha::adapter::{Adapter, DispatchedRequest};
use alpha::codec::build_response;
use alpha::invoke::{InvocationRequest, InvocationResponse, InvokeError};
use alpha::prelude::*;
use alpha::signing::{Credentials, StaticCredentialsProvider};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Stands in for the network so no test touches a socket.
struct Offline;

#[async_trait]
impl Adapter for Offline {
    async fn dispatch(&self, config: RequestConfig) -> alpha::Result<Response> {
        let url = config.full_url().ok().flatten().unwrap_or_default();
        let request = DispatchedRequest::Http {
            method: config.method,
            url: url.clone(),
            headers: config.headers.clone(),
        };
        let payload = if url.ends_with("/moved") {
            Payload::redirect(302, "function://svc/landing")
        } else {
            Payload::text(200, format!("network {}", url))
        };
        build_response(&config, request, payload)
    }
}

fn builder() -> ClientBuilder {
    Client::builder().network_adapter(Arc::new(Offline))
}

/// Records the paths of every event it receives.
fn recording<F>(paths: Arc<Mutex<Vec<String>>>, respond: F) -> Arc<dyn Handler>
where
    F: Fn(&InvocationEvent) -> Payload + Send + Sync + 'static,
{
    let respond = Arc::new(respond);
    Arc::new(handler_fn(move |event: InvocationEvent, _ctx: Context| {
        let paths = paths.clone();
        let respond = respond.clone();
        async move {
            paths.lock().unwrap().push(event.path.clone());
            Ok::<_, HandlerError>(respond(&event))
        }
    }))
}

/// Remote provider stand-in answering with a fixed response.
struct FakeInvoker {
    response: InvocationResponse,
    calls: AtomicU32,
}

impl FakeInvoker {
    fn new(payload: &str) -> Arc<Self> {
        Self::with_response(InvocationResponse {
            status_code: 200,
            payload: Some(payload.to_string()),
            ..InvocationResponse::default()
        })
    }

    fn with_response(response: InvocationResponse) -> Arc<Self> {
        Arc::new(Self {
            response,
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl Invoker for FakeInvoker {
    async fn invoke(
        &self,
        _request: InvocationRequest,
        _abort: CancellationToken,
    ) -> Result<InvocationResponse, InvokeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

/// Never finishes on its own; keeps every abort handle it is given.
#[derive(Default)]
struct Hanging {
    tokens: Mutex<Vec<CancellationToken>>,
}

#[async_trait]
impl Invoker for Hanging {
    async fn invoke(
        &self,
        _request: InvocationRequest,
        abort: CancellationToken,
    ) -> Result<InvocationResponse, InvokeError> {
        self.tokens.lock().unwrap().push(abort);
        std::future::pending::<()>().await;
        Err(InvokeError::Aborted)
    }
}

/// Answers with a valid payload, but only after sleeping for `delay`.
struct Late {
    delay: Duration,
    calls: AtomicU32,
    finished: AtomicU32,
}

impl Late {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            calls: AtomicU32::new(0),
            finished: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl Invoker for Late {
    async fn invoke(
        &self,
        _request: InvocationRequest,
        _abort: CancellationToken,
    ) -> Result<InvocationResponse, InvokeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(InvocationResponse {
            status_code: 200,
            payload: Some(r#"{"statusCode": 200, "body": "too late"}"#.to_string()),
            ..InvocationResponse::default()
        })
    }
}

#[tokio::test]
async fn test_function_url_with_local_handler() {
    let client = builder()
        .handler(Arc::new(handler_fn(|_event: InvocationEvent, _ctx: Context| async {
            Ok::<_, HandlerError>(Payload::text(200, "hi"))
        })))
        .build()
        .unwrap();

    let response = client.get("function://svc/some/path").await.unwrap();
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data, "hi");

    let event = response.request.event().unwrap();
    assert_eq!(event.http_method, "GET");
    assert_eq!(event.path, "/some/path");
    assert!(event.query_string_parameters.is_empty());
}

#[tokio::test]
async fn test_redirect_between_handler_paths() {
    let paths = Arc::new(Mutex::new(Vec::new()));
    let handler = recording(paths.clone(), |event| match event.path.as_str() {
        "/some/path" => Payload::redirect(302, "/other"),
        _ => Payload::text(200, "done"),
    });
    let client = builder().handler(handler).build().unwrap();

    let response = client.get("function://a/some/path").await.unwrap();
    assert_eq!(response.status.0, 200);
    assert_eq!(response.config.redirect_count(), 1);
    assert_eq!(*paths.lock().unwrap(), vec!["/some/path", "/other"]);
}

#[tokio::test]
async fn test_redirect_from_network_into_function() {
    let client = builder().build().unwrap();
    client
        .registry()
        .register(
            "svc",
            Arc::new(handler_fn(|event: InvocationEvent, _ctx: Context| async move {
                Ok::<_, HandlerError>(Payload::text(200, format!("landed on {}", event.path)))
            })),
        )
        .unwrap();

    let response = client.get("http://example.com/moved").await.unwrap();
    assert_eq!(response.data, "landed on /landing");
    assert!(response.request.event().is_some());
}

fn hops(until: u32, paths: Arc<Mutex<Vec<String>>>) -> Arc<dyn Handler> {
    recording(paths, move |event| {
        let hop: u32 = event
            .path
            .trim_start_matches("/hop/")
            .parse()
            .unwrap_or_default();
        if hop < until {
            Payload::redirect(302, format!("/hop/{}", hop + 1))
        } else {
            Payload::text(200, "arrived")
        }
    })
}

#[tokio::test]
async fn test_redirect_budget_is_inclusive() {
    let paths = Arc::new(Mutex::new(Vec::new()));
    let client = builder()
        .handler(hops(3, paths.clone()))
        .max_redirects(3)
        .build()
        .unwrap();

    let response = client.get("function://svc/hop/0").await.unwrap();
    assert_eq!(response.data, "arrived");
    assert_eq!(paths.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn test_redirect_budget_exceeded() {
    let paths = Arc::new(Mutex::new(Vec::new()));
    let client = builder()
        .handler(hops(4, paths.clone()))
        .max_redirects(3)
        .build()
        .unwrap();

    let err = client.get("function://svc/hop/0").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::RedirectBudgetExceeded);
    assert_eq!(err.message, "Exceeded maximum number of redirects.");
    assert_eq!(
        err.config.full_url().unwrap().as_deref(),
        Some("function://svc/hop/3")
    );
    assert_eq!(err.response_status(), Some(StatusCode(302)));
}

#[tokio::test]
async fn test_zero_budget_rejects_first_redirect() {
    let paths = Arc::new(Mutex::new(Vec::new()));
    let client = builder()
        .handler(hops(1, paths.clone()))
        .build()
        .unwrap();

    let err = client
        .request(RequestConfig::get("function://svc/hop/0").max_redirects(0))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::RedirectBudgetExceeded);
    assert_eq!(paths.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_ignore_redirects_surfaces_status_error() {
    let paths = Arc::new(Mutex::new(Vec::new()));
    let client = builder()
        .handler(hops(1, paths))
        .ignore_redirects(true)
        .build()
        .unwrap();

    let err = client.get("/hop/0").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::StatusValidation);
    assert_eq!(err.message, "Request failed with status code 302");
}

#[tokio::test(start_paused = true)]
async fn test_retry_on_server_error() {
    let paths = Arc::new(Mutex::new(Vec::new()));
    let client = builder()
        .handler(recording(paths.clone(), |_| Payload::text(503, "unavailable")))
        .retry(RetryConfig::new().attempts(2))
        .build()
        .unwrap();

    let err = client.get("/flaky").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::StatusValidation);
    assert_eq!(err.response_status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    assert_eq!(paths.lock().unwrap().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_retry_recovers() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let client = builder()
        .handler(Arc::new(handler_fn(move |_event: InvocationEvent, _ctx: Context| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                let status = if attempt == 0 { 500 } else { 200 };
                Ok::<_, HandlerError>(Payload::text(status, "body"))
            }
        })))
        .retry(RetryConfig::default())
        .build()
        .unwrap();

    let response = client.get("/eventually").await.unwrap();
    assert_eq!(response.status.0, 200);
    assert_eq!(response.config.retry_count(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let paths = Arc::new(Mutex::new(Vec::new()));
    let client = builder()
        .handler(recording(paths.clone(), |_| Payload::text(400, "bad")))
        .retry(RetryConfig::default())
        .build()
        .unwrap();

    let err = client.get("/bad").await.unwrap_err();
    assert_eq!(err.message, "Request failed with status code 400");
    assert_eq!(paths.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_remote_timeout_aborts_once() {
    let invoker = Arc::new(Hanging::default());
    let client = builder().invoker(invoker.clone()).build().unwrap();

    let started = tokio::time::Instant::now();
    let err = client
        .request(RequestConfig::get("function://svc/slow").timeout(Duration::from_millis(50)))
        .await
        .unwrap_err();

    assert!(err.is_invoke_timeout());
    assert!(err.is_aborted());
    assert_eq!(err.message, "Timeout after 50ms");
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert!(started.elapsed() < Duration::from_millis(100));

    let tokens = invoker.tokens.lock().unwrap();
    assert_eq!(tokens.len(), 1);
    assert!(tokens[0].is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_late_remote_result_is_ignored_after_timeout() {
    let invoker = Late::new(Duration::from_millis(51));
    let client = builder().invoker(invoker.clone()).build().unwrap();

    let err = client
        .request(RequestConfig::get("function://svc/slow").timeout(Duration::from_millis(50)))
        .await
        .unwrap_err();
    assert!(err.is_invoke_timeout());
    assert!(err.response.is_none());

    // Give the late result every chance to surface.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(invoker.calls.load(Ordering::SeqCst), 1);
    assert_eq!(invoker.finished.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_late_remote_result_is_not_retried_into_success() {
    let invoker = Late::new(Duration::from_millis(51));
    let client = builder().invoker(invoker.clone()).build().unwrap();

    let err = client
        .request(
            RequestConfig::get("function://svc/slow")
                .timeout(Duration::from_millis(50))
                .retry(RetryConfig::new().attempts(2)),
        )
        .await
        .unwrap_err();
    assert!(err.is_invoke_timeout());
    assert_eq!(err.config.retry_count(), 2);
    assert_eq!(invoker.calls.load(Ordering::SeqCst), 3);
    assert_eq!(invoker.finished.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_panicking_handler_is_a_request_error() {
    let client = builder()
        .handler(Arc::new(handler_fn(|_event: InvocationEvent, _ctx: Context| async {
            if true {
                panic!("handler blew up");
            }
            Ok::<_, HandlerError>(Payload::text(200, "unreachable"))
        })))
        .build()
        .unwrap();

    let caller = tokio::spawn(async move { client.get("/x").await });
    let err = caller.await.expect("caller task survives").unwrap_err();
    assert_eq!(err.kind, ErrorKind::HandlerInvocation);
    assert_eq!(err.message, "handler blew up");
    assert_eq!(err.request.unwrap().event().unwrap().path, "/x");
}

#[tokio::test(start_paused = true)]
async fn test_remote_timeout_is_retryable() {
    let invoker = Arc::new(Hanging::default());
    let client = builder().invoker(invoker.clone()).build().unwrap();

    let err = client
        .request(
            RequestConfig::get("function://svc/slow")
                .timeout(Duration::from_millis(10))
                .retry(RetryConfig::new().attempts(1)),
        )
        .await
        .unwrap_err();

    assert!(err.is_invoke_timeout());
    let tokens = invoker.tokens.lock().unwrap();
    assert_eq!(tokens.len(), 2);
    assert!(tokens.iter().all(CancellationToken::is_cancelled));
}

#[tokio::test]
async fn test_remote_invocation() {
    let invoker = FakeInvoker::new(
        r#"{"statusCode": 200, "headers": {"Content-Type": "text/plain"}, "body": "remote"}"#,
    );
    let client = builder()
        .base_url("function://user-service:deployed")
        .invoker(invoker.clone())
        .build()
        .unwrap();

    let response = client.get("/users/1").await.unwrap();
    assert_eq!(response.data, "remote");
    assert_eq!(response.header("content-type"), Some("text/plain"));
    let DispatchedRequest::Invocation(request) = &response.request else {
        panic!("expected a remote invocation");
    };
    assert_eq!(request.function_name, "user-service");
    assert_eq!(request.qualifier.as_deref(), Some("deployed"));
    assert_eq!(invoker.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_remote_function_error() {
    let invoker = FakeInvoker::with_response(InvocationResponse {
        status_code: 200,
        payload: Some(r#"{"errorMessage": "Something went wrong", "errorType": "Error"}"#.to_string()),
        function_error: Some("Handled".to_string()),
        ..InvocationResponse::default()
    });
    let client = builder().invoker(invoker).build().unwrap();

    let err = client.get("function://svc/x").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::FunctionError);
    assert_eq!(err.message, "Something went wrong");
    assert!(err.response.is_none());
}

#[tokio::test]
async fn test_local_handler_wins_over_remote_invoker() {
    let invoker = FakeInvoker::new(r#"{"statusCode": 200, "body": "remote"}"#);
    let client = builder()
        .base_url("function://svc")
        .invoker(invoker.clone())
        .handler(Arc::new(handler_fn(|_event: InvocationEvent, _ctx: Context| async {
            Ok::<_, HandlerError>(Payload::text(200, "local"))
        })))
        .build()
        .unwrap();

    let response = client.get("/x").await.unwrap();
    assert_eq!(response.data, "local");
    assert_eq!(invoker.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_validate_status_applies_to_every_transport() {
    let reject_404 = || -> alpha::client::ValidateStatus { Arc::new(|status: StatusCode| status.0 != 404) };

    let client = builder()
        .validate_status(reject_404())
        .handler(Arc::new(handler_fn(|_event: InvocationEvent, _ctx: Context| async {
            Ok::<_, HandlerError>(Payload::text(404, "local missing"))
        })))
        .build()
        .unwrap();
    let err = client.get("/missing").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::StatusValidation);
    let response = err.response.unwrap();
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.data, "local missing");

    let invoker = FakeInvoker::new(r#"{"statusCode": 404, "body": "remote missing"}"#);
    let client = builder()
        .validate_status(reject_404())
        .invoker(invoker)
        .build()
        .unwrap();
    let err = client.get("function://svc/missing").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::StatusValidation);
    let response = err.response.unwrap();
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.data, "remote missing");
}

#[tokio::test]
async fn test_binary_body_is_base64_encoded() {
    let client = builder()
        .handler(Arc::new(handler_fn(|event: InvocationEvent, _ctx: Context| async move {
            let body = serde_json::json!({
                "body": event.body,
                "isBase64Encoded": event.is_base64_encoded,
            });
            Ok::<_, HandlerError>(Payload::json(200, &body))
        })))
        .build()
        .unwrap();

    let response = client.post("/upload", vec![0u8, 1, 2, 255]).await.unwrap();
    let seen: serde_json::Value = response.json().unwrap();
    assert_eq!(seen["body"], "AAEC/w==");
    assert_eq!(seen["isBase64Encoded"], true);

    let response = client.post("/upload", "plain").await.unwrap();
    let seen: serde_json::Value = response.json().unwrap();
    assert_eq!(seen["body"], "plain");
    assert_eq!(seen["isBase64Encoded"], false);
}

#[tokio::test]
async fn test_duplicate_query_keys_are_multi_valued() {
    let client = builder()
        .handler(Arc::new(handler_fn(|_event: InvocationEvent, _ctx: Context| async {
            Ok::<_, HandlerError>(Payload::new(204))
        })))
        .build()
        .unwrap();

    let response = client
        .request(
            RequestConfig::get("/search?q=x&tag=old")
                .param("tag", "a")
                .param("tag", "b"),
        )
        .await
        .unwrap();
    let event = response.request.event().unwrap();
    assert_eq!(event.query_string_parameters.get("q").map(String::as_str), Some("x"));
    assert!(!event.query_string_parameters.contains_key("tag"));
    let multi = event.multi_value_query_string_parameters.as_ref().unwrap();
    assert_eq!(multi["tag"], vec!["a", "b"]);
}

#[tokio::test]
async fn test_callback_handler_through_client() {
    let client = builder()
        .handler(Arc::new(callback_handler_fn(
            |event: InvocationEvent, _ctx: Context, callback: Callback| {
                tokio::spawn(async move {
                    callback.succeed(Payload::text(200, format!("{} later", event.path)));
                });
            },
        )))
        .build()
        .unwrap();

    let response = client.get("/deferred").await.unwrap();
    assert_eq!(response.data, "/deferred later");
}

#[tokio::test]
async fn test_signed_request_reaches_handler() {
    let client = builder()
        .handler(Arc::new(handler_fn(|_event: InvocationEvent, _ctx: Context| async {
            Ok::<_, HandlerError>(Payload::new(200))
        })))
        .signing(
            SigningConfig::new()
                .service("execute-api")
                .region("eu-west-1")
                .credentials(Arc::new(StaticCredentialsProvider(Credentials::new(
                    "AKIDEXAMPLE",
                    "secret",
                )))),
        )
        .build()
        .unwrap();

    let response = client.get("function://svc:live/orders").await.unwrap();
    let event = response.request.event().unwrap();
    let authorization = event.headers.get("Authorization").unwrap();
    assert!(authorization.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/"));
    assert!(authorization.contains("/eu-west-1/execute-api/aws4_request"));
    assert!(event.headers.contains_key("X-Amz-Date"));
    assert_eq!(event.headers.get("Host").map(String::as_str), Some("svc"));
}

// Handler generated by the macro
#[alpha_handler(name = "macro-hello", description = "Greets from a macro")]
async fn macro_hello(event: InvocationEvent, _ctx: Context) -> Result<Payload, HandlerError> {
    Ok(Payload::text(200, format!("Hello from {}", event.path)))
}

#[test]
fn test_macro_handler_metadata() {
    assert_eq!(MacroHelloHandler::NAME, "macro-hello");
    assert_eq!(MacroHelloHandler::DESCRIPTION, "Greets from a macro");
}

#[tokio::test]
async fn test_macro_handler_is_registrable() {
    let client = builder().build().unwrap();
    client
        .registry()
        .register(MacroHelloHandler::NAME, MacroHelloHandler::arc())
        .unwrap();

    let response = client.get("function://macro-hello/greeting").await.unwrap();
    assert_eq!(response.data, "Hello from /greeting");
}
