//! The `function://` URL scheme.
//!
//! ```text
//! function://<name>[:<qualifier>][/<path>][?<query>]
//!
//! name      := functionName
//!            | accountId ":function:" functionName
//!            | "arn:" partition ":" service ":" region ":" accountId ":function:" functionName
//! qualifier := "$LATEST" | [A-Za-z0-9-_]+
//! ```

use std::fmt;

/// Scheme prefix for function URLs.
pub const FUNCTION_SCHEME: &str = "function://";

/// Sentinel qualifier naming the unpublished version of a function.
pub const LATEST_QUALIFIER: &str = "$LATEST";

/// A parsed `function://` URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionUrl {
    /// Function name, partial resource id or full resource id.
    pub name: String,
    /// Version or alias.
    pub qualifier: Option<String>,
    /// Path plus query string, verbatim. Empty when the URL has no path.
    pub path: String,
}

impl FunctionUrl {
    /// Parse a function URL. Returns `None` for anything that does not
    /// match the grammar.
    pub fn parse(url: &str) -> Option<Self> {
        let rest = url.strip_prefix(FUNCTION_SCHEME)?;

        // The query string is split off first and reattached untouched.
        let (head, query) = match rest.split_once('?') {
            Some((head, query)) => (head, Some(query)),
            None => (rest, None),
        };

        let (authority, path) = match head.find('/') {
            Some(idx) => head.split_at(idx),
            None => (head, ""),
        };

        let segments: Vec<&str> = authority.split(':').collect();
        let name_len = name_segments(&segments)?;
        let qualifier = match &segments[name_len..] {
            [] => None,
            [qualifier] if is_qualifier(qualifier) => Some(qualifier.to_string()),
            _ => return None,
        };

        let mut path = path.to_string();
        if let Some(query) = query {
            path.push('?');
            path.push_str(query);
        }

        Some(Self {
            name: segments[..name_len].join(":"),
            qualifier,
            path,
        })
    }

    /// The same URL with the qualifier dropped.
    pub fn without_qualifier(&self) -> String {
        format!("{}{}{}", FUNCTION_SCHEME, self.name, self.path)
    }

    /// The path with any query string removed.
    pub fn pathname(&self) -> &str {
        match self.path.split_once('?') {
            Some((pathname, _)) => pathname,
            None => &self.path,
        }
    }
}

impl fmt::Display for FunctionUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", FUNCTION_SCHEME, self.name)?;
        if let Some(qualifier) = &self.qualifier {
            write!(f, ":{}", qualifier)?;
        }
        f.write_str(&self.path)
    }
}

/// How many leading `:` segments make up the function name.
fn name_segments(segments: &[&str]) -> Option<usize> {
    let full_arn = segments.len() >= 7
        && segments[0] == "arn"
        && is_token(segments[1])
        && is_token(segments[2])
        && is_token(segments[3])
        && is_account_id(segments[4])
        && segments[5] == "function"
        && is_token(segments[6]);
    if full_arn {
        return Some(7);
    }

    let partial_arn = segments.len() >= 3
        && is_account_id(segments[0])
        && segments[1] == "function"
        && is_token(segments[2]);
    if partial_arn {
        return Some(3);
    }

    segments.first().filter(|s| is_token(s)).map(|_| 1)
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn is_account_id(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_qualifier(s: &str) -> bool {
    s == LATEST_QUALIFIER || is_token(s)
}
