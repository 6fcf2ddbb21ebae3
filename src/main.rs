//! Alpha - Example client
//!
//! Registers in-process handlers, calls them through `function://` URLs,
//! follows a redirect between them, and optionally fetches a URL given on
//! the command line through the same client.

use alpha::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Greets whoever the query names.
#[alpha_handler(name = "greeter", description = "Says hello")]
async fn greeter(event: InvocationEvent, ctx: Context) -> Result<Payload, HandlerError> {
    let name = event
        .query_string_parameters
        .get("name")
        .cloned()
        .unwrap_or_else(|| "World".to_string());

    let body = serde_json::json!({
        "message": format!("Hello, {}!", name),
        "method": event.http_method,
        "path": event.path,
        "request_id": ctx.aws_request_id,
    });
    Ok(Payload::json(200, &body))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let client = Client::builder()
        .timeout(Duration::from_secs(10))
        .retry(RetryConfig::default())
        .build()?;

    client.registry().register(GreeterHandler::NAME, GreeterHandler::arc())?;
    // Sends everything it receives on to the greeter.
    client.registry().register(
        "moved",
        Arc::new(handler_fn(|event: InvocationEvent, _ctx: Context| async move {
            Ok::<_, HandlerError>(Payload::redirect(
                302,
                format!("function://greeter{}?name=redirected", event.path),
            ))
        })),
    )?;

    tracing::info!("Registered handlers: {:?}", client.registry().list());

    let response = client.get("function://greeter/hello?name=alpha").await?;
    tracing::info!("{} {}: {:?}", response.status, response.status_text, response.data);

    let response = client.get("function://moved/hello").await?;
    tracing::info!(
        "After redirect, {} {}: {:?}",
        response.status,
        response.status_text,
        response.data
    );

    if let Some(url) = std::env::args().nth(1) {
        tracing::info!("Fetching {}", url);
        match client.get(url).await {
            Ok(response) => {
                tracing::info!("{} {}", response.status, response.status_text);
                println!("{}", String::from_utf8_lossy(&response.data.to_bytes()));
            }
            Err(err) => tracing::error!("Request failed: {}", err),
        }
    }

    Ok(())
}
