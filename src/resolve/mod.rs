//! URL classification and resolution across `http(s)://` and `function://`.

mod function_url;

pub use function_url::{FunctionUrl, FUNCTION_SCHEME, LATEST_QUALIFIER};

use thiserror::Error;
use url::Url;

/// Stand-in authority used while joining against a function URL. A
/// qualifier is not a valid port and a resource id is not a valid host, so
/// both are swapped out and restored after the join.
const PLACEHOLDER_BASE: &str = "function://function.invalid:0";

/// Stand-in origin for path-only bases.
const FAKE_HOST: &str = "http://fake.fake";

/// Errors produced while resolving URLs.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The base or joined URL could not be parsed.
    #[error("Unable to resolve '{url}' against '{base}': {source}")]
    Invalid {
        url: String,
        base: String,
        #[source]
        source: url::ParseError,
    },

    /// Joining against a function URL produced something that is not one.
    #[error("Resolving '{url}' against '{base}' did not produce a function URL")]
    NotAFunctionUrl { url: String, base: String },
}

/// Check whether a URL has a scheme or is protocol-relative.
pub fn is_absolute_url(url: &str) -> bool {
    url.starts_with("//") || has_scheme(url)
}

/// Check whether a URL uses the function scheme.
pub fn is_function_url(url: &str) -> bool {
    url.starts_with(FUNCTION_SCHEME)
}

/// `^[a-z][a-z0-9+.-]*://`, case-insensitive.
fn has_scheme(url: &str) -> bool {
    let Some(idx) = url.find("://") else {
        return false;
    };
    let scheme = &url[..idx];
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
}

/// Resolve `url` against `base`.
///
/// Absolute URLs are returned unchanged. Function-URL bases keep their
/// name and qualifier; only the path and query are resolved.
pub fn resolve(url: &str, base: &str) -> Result<String, ResolveError> {
    if is_absolute_url(url) {
        return Ok(url.to_string());
    }

    let invalid = |source| ResolveError::Invalid {
        url: url.to_string(),
        base: base.to_string(),
        source,
    };

    let Some(base_parts) = FunctionUrl::parse(base) else {
        if base.starts_with('/') {
            let joined = Url::parse(&format!("{}{}", FAKE_HOST, base))
                .and_then(|b| b.join(url))
                .map_err(invalid)?;
            let joined = joined.to_string();
            return Ok(joined
                .strip_prefix(FAKE_HOST)
                .map(str::to_string)
                .unwrap_or(joined));
        }

        let joined = Url::parse(base).and_then(|b| b.join(url)).map_err(invalid)?;
        return Ok(joined.to_string());
    };

    let sanitized = format!("{}{}", PLACEHOLDER_BASE, base_parts.path);
    let joined = Url::parse(&sanitized)
        .and_then(|b| b.join(url))
        .map_err(invalid)?;

    if joined.scheme() != "function" || joined.host_str() != Some("function.invalid") {
        return Err(ResolveError::NotAFunctionUrl {
            url: url.to_string(),
            base: base.to_string(),
        });
    }

    let mut path = joined.path().to_string();
    if let Some(query) = joined.query() {
        path.push('?');
        path.push_str(query);
    }
    if let Some(fragment) = joined.fragment() {
        path.push('#');
        path.push_str(fragment);
    }

    Ok(FunctionUrl {
        name: base_parts.name,
        qualifier: base_parts.qualifier,
        path,
    }
    .to_string())
}

/// Resolve with either side optional. A missing or empty `url` yields the
/// base; a missing or empty base yields the url.
pub fn resolve_optional(
    url: Option<&str>,
    base: Option<&str>,
) -> Result<Option<String>, ResolveError> {
    let url = url.filter(|u| !u.is_empty());
    let base = base.filter(|b| !b.is_empty());
    match (url, base) {
        (None, base) => Ok(base.map(str::to_string)),
        (Some(url), None) => Ok(Some(url.to_string())),
        (Some(url), Some(base)) => resolve(url, base).map(Some),
    }
}
