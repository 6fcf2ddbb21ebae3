//! Exponential-backoff retry.

use crate::client::RequestConfig;
use crate::error::RequestError;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Decides whether a failed request is retried.
pub type RetryCondition = Arc<dyn Fn(&RequestError) -> bool + Send + Sync>;

/// Retry policy. Retries happen only when a request carries one.
#[derive(Clone)]
pub struct RetryConfig {
    /// Retries after the first call; a request runs at most `attempts + 1`
    /// times.
    pub attempts: u32,
    /// Backoff base. A NaN delay becomes zero and negative delays clamp to zero.
    pub factor: f64,
    /// Upper bound on a single delay.
    pub max_timeout: Duration,
    /// Defaults to [`is_retryable_error`].
    pub retry_condition: Option<RetryCondition>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            factor: 2.0,
            max_timeout: Duration::from_millis(10_000),
            retry_condition: None,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of retries after the first call, not the total number of calls.
    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    pub fn max_timeout(mut self, max_timeout: Duration) -> Self {
        self.max_timeout = max_timeout;
        self
    }

    pub fn retry_condition(mut self, condition: RetryCondition) -> Self {
        self.retry_condition = Some(condition);
        self
    }

    /// Whether `err` qualifies for a retry, ignoring the attempt budget.
    pub fn should_retry(&self, err: &RequestError) -> bool {
        match &self.retry_condition {
            Some(condition) => condition(err),
            None => is_retryable_error(err),
        }
    }

    /// Delay before re-issue number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let mut rng = rand::thread_rng();
        self.backoff_with(attempt, rng.gen::<f64>(), rng.gen::<f64>())
    }

    /// [`RetryConfig::backoff`] with the random draws supplied; both are in `[0, 1)`.
    pub fn backoff_with(&self, attempt: u32, spread: f64, jitter: f64) -> Duration {
        let jitter = 1.0 - (jitter % 0.3);
        let millis = self.factor.powi(attempt as i32) * spread * 1000.0 * jitter;
        let max = self.max_timeout.as_secs_f64() * 1000.0;
        if millis.is_nan() {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(millis.clamp(0.0, max) / 1000.0)
    }
}

impl std::fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryConfig")
            .field("attempts", &self.attempts)
            .field("factor", &self.factor)
            .field("max_timeout", &self.max_timeout)
            .field("retry_condition", &self.retry_condition.is_some())
            .finish()
    }
}

/// Invocation timeouts are retryable. Otherwise an error is retryable when
/// it was not aborted and either produced no response or a 5xx.
pub fn is_retryable_error(err: &RequestError) -> bool {
    if err.is_invoke_timeout() {
        return true;
    }
    !err.is_aborted()
        && err
            .response_status()
            .map_or(true, |status| status.is_server_error())
}

/// Delay before re-issuing `config` after `err`, or `None` to give up.
pub fn next_retry(config: &RequestConfig, err: &RequestError) -> Option<Duration> {
    let retry = config.retry.as_ref()?;
    if config.retry_count >= retry.attempts || !retry.should_retry(err) {
        return None;
    }
    Some(retry.backoff(config.retry_count + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, ABORTED};

    fn error(kind: ErrorKind) -> RequestError {
        RequestError::new(kind, "failed", RequestConfig::get("/"))
    }

    #[test]
    fn test_defaults() {
        let retry = RetryConfig::default();
        assert_eq!(retry.attempts, 3);
        assert_eq!(retry.factor, 2.0);
        assert_eq!(retry.max_timeout, Duration::from_millis(10_000));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(is_retryable_error(&error(ErrorKind::HandlerInvocation)));
        assert!(is_retryable_error(
            &error(ErrorKind::RemoteInvocationTimeout).with_code(ABORTED)
        ));
        assert!(!is_retryable_error(&error(ErrorKind::Network).with_code(ABORTED)));
    }

    #[test]
    fn test_backoff_bounds() {
        let retry = RetryConfig::default();
        // factor^1 * 1000 * spread, jitter between 0.7 and 1
        assert_eq!(retry.backoff_with(1, 0.5, 0.0), Duration::from_millis(1000));
        assert_eq!(retry.backoff_with(2, 0.5, 0.1).as_millis(), 1800);
        assert_eq!(retry.backoff_with(10, 0.99, 0.0), Duration::from_millis(10_000));
        assert_eq!(retry.backoff_with(3, 0.0, 0.5), Duration::ZERO);

        for attempt in 1..=5 {
            let delay = retry.backoff(attempt);
            assert!(delay <= retry.max_timeout);
        }
    }

    #[test]
    fn test_backoff_with_unusable_factor() {
        let nan = RetryConfig::new().factor(f64::NAN);
        assert_eq!(nan.backoff_with(1, 0.5, 0.0), Duration::ZERO);
        assert!(nan.backoff(3) <= nan.max_timeout);

        let negative = RetryConfig::new().factor(-2.0);
        assert_eq!(negative.backoff_with(1, 0.5, 0.0), Duration::ZERO);
        assert_eq!(negative.backoff_with(2, 0.5, 0.0), Duration::from_millis(2000));

        let infinite = RetryConfig::new().factor(f64::INFINITY);
        assert_eq!(infinite.backoff_with(1, 0.5, 0.0), infinite.max_timeout);
        assert_eq!(infinite.backoff_with(1, 0.0, 0.0), Duration::ZERO);
    }

    #[test]
    fn test_next_retry_respects_budget() {
        let err = error(ErrorKind::HandlerInvocation);
        let mut config = RequestConfig::get("/").retry(RetryConfig::new().attempts(2));
        assert!(next_retry(&config, &err).is_some());
        config.retry_count = 2;
        assert!(next_retry(&config, &err).is_none());
    }

    #[test]
    fn test_no_policy_no_retry() {
        assert!(next_retry(&RequestConfig::get("/"), &error(ErrorKind::HandlerInvocation)).is_none());
    }

    #[test]
    fn test_custom_condition() {
        let config = RequestConfig::get("/")
            .retry(RetryConfig::new().retry_condition(Arc::new(|_: &RequestError| false)));
        assert!(next_retry(&config, &error(ErrorKind::HandlerInvocation)).is_none());
    }
}
