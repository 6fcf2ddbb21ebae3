//! Signature Version 4 request signing.

use crate::http::Headers;
use crate::signing::Credentials;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Headers left out of the signature. Proxies and clients rewrite them.
const UNSIGNABLE_HEADERS: [&str; 7] = [
    "authorization",
    "connection",
    "x-amzn-trace-id",
    "user-agent",
    "expect",
    "presigned-expires",
    "range",
];

/// The parts of a request that are signed.
#[derive(Debug, Clone)]
pub struct SignableRequest<'a> {
    pub method: &'a str,
    /// Host, with `:port` when the port is not the scheme default.
    pub host: &'a str,
    pub path: &'a str,
    /// Decoded query pairs.
    pub query: &'a [(String, String)],
    pub headers: &'a Headers,
    pub body: &'a [u8],
}

/// Who signs, for what, and when.
#[derive(Debug, Clone)]
pub struct SigningParams<'a> {
    pub credentials: &'a Credentials,
    pub region: &'a str,
    pub service: &'a str,
    pub time: DateTime<Utc>,
    /// Normalize and escape the path before signing. Disabled for S3.
    pub uri_escape_path: bool,
}

/// Compute the signature headers for `request`: `Host` when absent,
/// `X-Amz-Date`, `X-Amz-Security-Token` when a session token is present,
/// and `Authorization`.
pub fn sign(request: &SignableRequest<'_>, params: &SigningParams<'_>) -> Headers {
    let amz_date = params.time.format("%Y%m%dT%H%M%SZ").to_string();
    let short_date = params.time.format("%Y%m%d").to_string();

    let mut added = Headers::new();
    if !request.headers.contains("host") {
        added.insert("Host", request.host);
    }
    added.insert("X-Amz-Date", amz_date.clone());
    if let Some(token) = &params.credentials.session_token {
        added.insert("X-Amz-Security-Token", token.clone());
    }

    let mut signing_headers = request.headers.clone();
    signing_headers.merge(&added);

    let (canonical_headers, signed_headers) = canonical_headers(&signing_headers);
    let canonical_request = [
        request.method.to_uppercase(),
        canonical_uri(request.path, params.uri_escape_path),
        canonical_query(request.query),
        canonical_headers,
        signed_headers.clone(),
        hex::encode(Sha256::digest(request.body)),
    ]
    .join("\n");

    let scope = format!("{}/{}/{}/aws4_request", short_date, params.region, params.service);
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let key = signing_key(
        &params.credentials.secret_access_key,
        &short_date,
        params.region,
        params.service,
    );
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes()));

    added.insert(
        "Authorization",
        format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, params.credentials.access_key_id, scope, signed_headers, signature
        ),
    );
    added
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return Vec::new(),
    };
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Derive the signing key: `kSecret → kDate → kRegion → kService → kSigning`.
pub fn signing_key(secret: &str, short_date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{}", secret).as_bytes(), short_date.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, service.as_bytes());
    hmac(&k_service, b"aws4_request")
}

/// Lowercased, sorted `name:value` lines plus the `;`-joined name list.
fn canonical_headers(headers: &Headers) -> (String, String) {
    let mut entries: Vec<(String, String)> = Vec::new();
    for (name, value) in headers.iter() {
        let name = name.to_ascii_lowercase();
        if UNSIGNABLE_HEADERS.contains(&name.as_str()) {
            continue;
        }
        let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
        match entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => {
                existing.push(',');
                existing.push_str(&value);
            }
            None => entries.push((name, value)),
        }
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let canonical = entries
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value))
        .collect::<String>();
    let signed = entries
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");
    (canonical, signed)
}

fn canonical_uri(path: &str, uri_escape_path: bool) -> String {
    let path = if path.is_empty() { "/" } else { path };
    if !uri_escape_path {
        return path.to_string();
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }

    let mut normalized = String::new();
    if path.starts_with('/') {
        normalized.push('/');
    }
    normalized.push_str(&segments.join("/"));
    if !segments.is_empty() && path.ends_with('/') {
        normalized.push('/');
    }

    normalized
        .split('/')
        .map(uri_encode)
        .collect::<Vec<_>>()
        .join("/")
}

fn canonical_query(query: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .filter(|(key, _)| !key.eq_ignore_ascii_case("x-amz-signature"))
        .map(|(key, value)| (uri_encode(key), uri_encode(value)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&")
}

/// Percent-encode everything except unreserved characters.
fn uri_encode(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}
