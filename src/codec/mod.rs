//! Conversion between requests and invocation events, and between
//! invocation results and responses.

mod event;
mod payload;

pub use event::{build_event, Identity, InvocationEvent, RequestContext};
pub use payload::{build_response, settle, Payload};
