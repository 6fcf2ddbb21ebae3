//! Local function handlers: the handler trait, its execution context and
//! the registry that maps function names to in-process handlers.

pub mod context;
pub mod handler;
pub mod registry;

pub use context::Context;
pub use handler::{
    callback_handler_fn, handler_fn, Callback, CallbackHandlerFn, Completion, Handler,
    HandlerError, HandlerFn,
};
pub use registry::HandlerRegistry;

pub(crate) use handler::invoke;
