//! Service and region inference from provider hostnames.
//!
//! Hostnames look like `<code1>.[dualstack.][<code2>.]amazonaws.com[.cn]`.

use crate::invoke::DEFAULT_REGION;

const PROVIDER_DOMAIN: &str = ".amazonaws.com";

/// Service and region derived from a hostname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCodes {
    pub service: String,
    pub region: String,
}

/// Infer the signing service and region for `host`. Hosts outside the
/// provider domain yield an empty service and the default region.
pub fn match_host(host: &str) -> HostCodes {
    let host = host.split(':').next().unwrap_or(host);
    let trimmed = host.strip_suffix(".cn").unwrap_or(host);

    let Some((code1, code2)) = trimmed
        .strip_suffix(PROVIDER_DOMAIN)
        .and_then(|prefix| split_codes(prefix))
    else {
        return HostCodes {
            service: String::new(),
            region: DEFAULT_REGION.to_string(),
        };
    };

    let (service, region) = match (code1, code2) {
        (region, Some("es")) => ("es", Some(region)),
        (_, Some("s3")) => ("s3", Some(DEFAULT_REGION)),
        ("email", region) => ("ses", region),
        (code1, region) if code1.starts_with("s3-") => ("s3", region),
        (service, region) => (service, region),
    };

    HostCodes {
        service: service.to_string(),
        region: region.unwrap_or(DEFAULT_REGION).to_string(),
    }
}

/// Pick `code1` and the optional `code2` from the labels in front of the
/// provider domain, matching the rightmost labels the way an unanchored
/// leftmost pattern match would.
fn split_codes(prefix: &str) -> Option<(&str, Option<&str>)> {
    let labels: Vec<&str> = prefix.split('.').collect();
    let n = labels.len();
    if labels.iter().any(|label| label.is_empty()) {
        return None;
    }

    match n {
        0 => None,
        1 => Some((labels[0], None)),
        _ if n >= 3 && labels[n - 2] == "dualstack" => Some((labels[n - 3], Some(labels[n - 1]))),
        _ if labels[n - 1] == "dualstack" => Some((labels[n - 2], None)),
        _ => Some((labels[n - 2], Some(labels[n - 1]))),
    }
}
