//! HTTP types shared by the client and every transport.

mod headers;
mod request;
mod response;

pub use headers::Headers;
pub use request::{Body, Method, ResponseType};
pub use response::{Data, Response, StatusCode};
