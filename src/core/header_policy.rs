//! Which headers cross the proxy in each direction.
//!
//! axum and reqwest 0.11 are built on different major versions of the `http`
//! crate, so headers are copied name-by-name through their byte form.

use axum::http::header::CONTENT_LENGTH;
use axum::http::{HeaderMap, HeaderName, HeaderValue};

/// Inbound headers never sent upstream. The client recomputes `Content-Length`
/// and negotiates `Accept-Encoding` itself, limited to encodings it can decode.
const STRIPPED_REQUEST_HEADERS: [&str; 3] = ["host", "content-length", "accept-encoding"];

/// Upstream headers never relayed. The body is relayed fully buffered and
/// already decoded, so its framing and encoding headers no longer apply.
const STRIPPED_RESPONSE_HEADERS: [&str; 2] = ["transfer-encoding", "content-encoding"];

fn is_stripped(name: &str, stripped: &[&str]) -> bool {
    stripped.iter().any(|s| name.eq_ignore_ascii_case(s))
}

/// Headers to send upstream: everything inbound except `Host`,
/// `Content-Length` and `Accept-Encoding`.
pub fn upstream_request_headers(inbound: &HeaderMap) -> reqwest::header::HeaderMap {
    let mut outbound = reqwest::header::HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound {
        if is_stripped(name.as_str(), &STRIPPED_REQUEST_HEADERS) {
            continue;
        }
        let converted = (
            reqwest::header::HeaderName::from_bytes(name.as_str().as_bytes()),
            reqwest::header::HeaderValue::from_bytes(value.as_bytes()),
        );
        match converted {
            (Ok(name), Ok(value)) => {
                outbound.append(name, value);
            }
            _ => tracing::debug!(header = %name, "Skipping unconvertible request header"),
        }
    }
    outbound
}

/// Headers to relay to the caller.
///
/// With `Some(body_len)` the upstream `Content-Length` is replaced by the length
/// of the relayed body. `None` keeps the upstream value, as for `HEAD`.
pub fn caller_response_headers(
    upstream: &reqwest::header::HeaderMap,
    body_len: Option<usize>,
) -> HeaderMap {
    let mut relayed = HeaderMap::with_capacity(upstream.len() + 1);
    for (name, value) in upstream {
        if is_stripped(name.as_str(), &STRIPPED_RESPONSE_HEADERS) {
            continue;
        }
        let converted = (
            HeaderName::from_bytes(name.as_str().as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        );
        match converted {
            (Ok(name), Ok(value)) => {
                relayed.append(name, value);
            }
            _ => tracing::debug!(header = %name, "Skipping unconvertible response header"),
        }
    }
    if let Some(len) = body_len {
        relayed.insert(CONTENT_LENGTH, HeaderValue::from(len));
    }
    relayed
}
