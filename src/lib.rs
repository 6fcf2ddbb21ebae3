//! # Alpha - One HTTP Client for Sockets and Functions
//!
//! Alpha is an HTTP client that sends each request either over the network
//! or straight into a serverless function handler, in-process or through a
//! remote invocation API. Callers see the same request and response shapes
//! whichever transport ran.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                              Client                                 │
//! │     defaults ─► request interceptors ─► signing ─► adapter chain    │
//! │            ▲                                            │           │
//! │            └────── redirect (301/302) / retry ◄─────────┤           │
//! └─────────────────────────────────────────────────────────┼───────────┘
//!                                                           ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          Adapter Chain                              │
//! │  ┌──────────┐   ┌───────────────┐   ┌──────────────┐   ┌─────────┐  │
//! │  │ override │ ► │ local handler │ ► │ remote       │ ► │ network │  │
//! │  │          │   │ (registry)    │   │ invocation   │   │ reqwest │  │
//! │  └──────────┘   └───────────────┘   └──────────────┘   └─────────┘  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use alpha::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let client = Client::builder()
//!         .base_url("function://user-service:deployed")
//!         .build()?;
//!
//!     // Served in-process while the name is registered.
//!     client.registry().register(
//!         "user-service",
//!         Arc::new(handler_fn(|event: InvocationEvent, _ctx: Context| async move {
//!             Ok::<_, HandlerError>(Payload::text(200, format!("Hello from {}", event.path)))
//!         })),
//!     )?;
//!
//!     let response = client.get("/users/42").await?;
//!     println!("{} {:?}", response.status, response.data);
//!     Ok(())
//! }
//! ```
//!
//! ## Function URLs
//!
//! `function://<name>[:<qualifier>][/<path>][?<query>]`, where `<name>` is a
//! bare name, `<account>:function:<name>` or a full resource name. Relative
//! URLs resolve against a `function://` base URL the same way they resolve
//! against an `http://` one, and redirects may cross between the two.
//!
//! ## Handlers
//!
//! Handlers receive a proxy-style [`InvocationEvent`] and a [`Context`] and
//! either return a [`Payload`] or report it through their [`Callback`];
//! whichever happens first wins.

pub mod adapter;
pub mod client;
pub mod codec;
pub mod error;
pub mod function;
pub mod http;
pub mod interceptors;
pub mod invoke;
pub mod resolve;
pub mod signing;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::client::{Client, ClientBuilder, RequestConfig};
    pub use crate::codec::{InvocationEvent, Payload};
    pub use crate::error::{ErrorKind, RequestError};
    pub use crate::function::{
        callback_handler_fn, handler_fn, Callback, Context, Handler, HandlerError,
        HandlerRegistry,
    };
    pub use crate::http::{Body, Data, Headers, Method, Response, ResponseType, StatusCode};
    pub use crate::interceptors::RetryConfig;
    pub use crate::invoke::{Invoker, InvokerOptions};
    pub use crate::signing::SigningConfig;
    pub use alpha_macro::alpha_handler;
    pub use async_trait::async_trait;
}

// Re-export for convenience
pub use alpha_macro::alpha_handler;
pub use client::{Client, ClientBuilder, RequestConfig};
pub use codec::{InvocationEvent, Payload};
pub use error::{ErrorKind, RequestError, Result};
pub use function::{Callback, Context, Handler, HandlerError, HandlerRegistry};
pub use crate::http::{Response, StatusCode};
