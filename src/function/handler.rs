//! Local function handler trait and completion callback.

use crate::codec::{InvocationEvent, Payload};
use crate::function::Context;
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// Outcome reported through a [`Callback`].
pub type Completion = Result<Payload, HandlerError>;

/// A locally invoked function handler.
///
/// Handlers may finish in either of two ways: by returning `Ok(Some(payload))`
/// (or an error) from [`Handler::handle`], or by returning `Ok(None)` and
/// reporting the outcome later through the [`Callback`]. Whichever happens
/// first wins; the other is ignored.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handle one invocation.
    async fn handle(
        &self,
        event: InvocationEvent,
        context: Context,
        callback: Callback,
    ) -> Result<Option<Payload>, HandlerError>;
}

/// One-shot completion callback handed to every handler invocation.
///
/// Cloneable; only the first call is delivered.
#[derive(Clone)]
pub struct Callback {
    sender: Arc<Mutex<Option<oneshot::Sender<Completion>>>>,
}

impl Callback {
    /// Create a callback and the receiver for its outcome.
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Completion>) {
        let (tx, rx) = oneshot::channel();
        let callback = Self {
            sender: Arc::new(Mutex::new(Some(tx))),
        };
        (callback, rx)
    }

    /// Report the outcome. Returns `false` if an outcome was already
    /// reported or nobody is waiting any more.
    pub fn call(&self, result: Completion) -> bool {
        let sender = match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match sender {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }

    /// Report a successful result.
    pub fn succeed(&self, payload: Payload) -> bool {
        self.call(Ok(payload))
    }

    /// Report a failure.
    pub fn fail(&self, error: impl Into<HandlerError>) -> bool {
        self.call(Err(error.into()))
    }
}

impl std::fmt::Debug for Callback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callback").finish_non_exhaustive()
    }
}

/// Handler built from an async function returning its result directly.
pub struct HandlerFn<F> {
    f: F,
}

/// Wrap an async closure as a [`Handler`].
///
/// ```rust,no_run
/// use alpha::prelude::*;
///
/// let handler = handler_fn(|event: InvocationEvent, _ctx: Context| async move {
///     Ok::<_, HandlerError>(Payload::text(200, format!("Hello from {}", event.path)))
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(InvocationEvent, Context) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Payload, HandlerError>> + Send,
{
    HandlerFn { f }
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(InvocationEvent, Context) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Payload, HandlerError>> + Send,
{
    async fn handle(
        &self,
        event: InvocationEvent,
        context: Context,
        _callback: Callback,
    ) -> Result<Option<Payload>, HandlerError> {
        (self.f)(event, context).await.map(Some)
    }
}

/// Handler built from a function that reports through its callback.
pub struct CallbackHandlerFn<F> {
    f: F,
}

/// Wrap a callback-style function as a [`Handler`].
///
/// The function may call the callback before returning or hand it to a
/// spawned task.
pub fn callback_handler_fn<F>(f: F) -> CallbackHandlerFn<F>
where
    F: Fn(InvocationEvent, Context, Callback) + Send + Sync,
{
    CallbackHandlerFn { f }
}

#[async_trait]
impl<F> Handler for CallbackHandlerFn<F>
where
    F: Fn(InvocationEvent, Context, Callback) + Send + Sync,
{
    async fn handle(
        &self,
        event: InvocationEvent,
        context: Context,
        callback: Callback,
    ) -> Result<Option<Payload>, HandlerError> {
        (self.f)(event, context, callback);
        Ok(None)
    }
}

/// Run a handler and wait for whichever completion path fires first.
///
/// A panic inside the handler is reported as a [`HandlerError`].
pub(crate) async fn invoke(
    handler: &dyn Handler,
    event: InvocationEvent,
    context: Context,
) -> Result<Payload, HandlerError> {
    let (callback, mut completion) = Callback::channel();
    let invocation = AssertUnwindSafe(handler.handle(event, context, callback))
        .catch_unwind()
        .map(|outcome| outcome.unwrap_or_else(|panic| Err(HandlerError::panicked(panic))));
    tokio::pin!(invocation);

    let mut callback_dropped = false;
    loop {
        tokio::select! {
            done = &mut completion, if !callback_dropped => match done {
                Ok(result) => return result,
                // The handler no longer holds the callback; its return value decides.
                Err(_) => callback_dropped = true,
            },
            returned = &mut invocation => {
                return match returned {
                    Ok(Some(payload)) => Ok(payload),
                    Err(err) => Err(err),
                    Ok(None) if callback_dropped => Err(HandlerError::no_result()),
                    Ok(None) => completion.await.unwrap_or_else(|_| Err(HandlerError::no_result())),
                };
            }
        }
    }
}

/// Error raised by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    /// Error message.
    pub message: String,
    /// Optional error type name.
    pub error_type: Option<String>,
}

impl HandlerError {
    /// Create a new HandlerError.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: None,
        }
    }

    /// Create a HandlerError with an error type.
    pub fn with_type(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: Some(error_type.into()),
        }
    }

    fn no_result() -> Self {
        Self::new("Handler completed without producing a result")
    }

    fn panicked(panic: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = panic.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = panic.downcast_ref::<String>() {
            message.clone()
        } else {
            "Handler panicked".to_string()
        };
        Self::with_type("Panic", message)
    }
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error_type {
            Some(error_type) => write!(f, "{}: {}", error_type, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for HandlerError {}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        HandlerError::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        HandlerError::new(message)
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(err: std::io::Error) -> Self {
        HandlerError::with_type("IoError", err.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::with_type("SerdeError", err.to_string())
    }
}
