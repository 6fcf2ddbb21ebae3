//! Request interceptors and the response-side redirect and retry policies.

pub mod redirect;
pub mod retry;

pub use retry::{is_retryable_error, RetryCondition, RetryConfig};

use crate::client::RequestConfig;
use crate::error::Result;
use async_trait::async_trait;

/// Transforms a request before it is dispatched.
///
/// Interceptors run in registration order on every dispatch, including
/// retries and redirect hops. Request signing always runs after them.
#[async_trait]
pub trait RequestInterceptor: Send + Sync {
    async fn intercept(&self, config: RequestConfig) -> Result<RequestConfig>;
}
