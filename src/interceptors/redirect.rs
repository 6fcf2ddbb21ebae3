//! Following 301/302 responses across `http(s)://` and `function://`.

use crate::client::{RequestConfig, DEFAULT_MAX_REDIRECTS};
use crate::error::{ErrorKind, RequestError, Result};
use crate::http::Response;
use crate::resolve::resolve;
use tracing::{debug, warn};

/// The config for the next hop, or `None` when `response` is final.
///
/// `config` is the request as issued (before request interceptors ran).
/// Fails with [`ErrorKind::RedirectBudgetExceeded`] once the budget is spent.
pub fn next_hop(config: &RequestConfig, response: &Response) -> Result<Option<RequestConfig>> {
    if !response.status.is_followed_redirect() {
        return Ok(None);
    }

    let Some(location) = response.header("location") else {
        warn!("{} response without a Location header, not following", response.status);
        return Ok(None);
    };

    let budget = config.max_redirects.unwrap_or(DEFAULT_MAX_REDIRECTS);
    if config.redirect_count >= budget {
        return Err(RequestError::new(
            ErrorKind::RedirectBudgetExceeded,
            "Exceeded maximum number of redirects.",
            response.config.clone(),
        )
        .with_request(response.request.clone())
        .with_response(response.clone()));
    }

    let current = config
        .full_url()
        .map_err(|err| invalid(config, response, err.to_string()))?
        .unwrap_or_else(|| "/".to_string());
    let target = resolve(location, &current).map_err(|err| invalid(config, response, err.to_string()))?;

    debug!("Following {} redirect from {} to {}", response.status, current, target);

    let mut next = config.clone();
    next.url = Some(target);
    next.base_url = None;
    next.redirect_count += 1;
    Ok(Some(next))
}

fn invalid(config: &RequestConfig, response: &Response, message: String) -> RequestError {
    RequestError::new(ErrorKind::InvalidUrl, message, config.clone())
        .with_request(response.request.clone())
        .with_response(response.clone())
}
