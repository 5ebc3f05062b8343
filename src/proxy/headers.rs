//! Header translation between the caller and the upstream origin
//!
//! Two policies exist behind one configuration switch. The filtered policy
//! hides the proxy from the origin: identifying request headers are dropped
//! and a browser-like header set is presented instead, while only a fixed
//! allowlist of response headers travels back. The passthrough policy copies
//! headers unchanged in both directions. Hop-by-hop headers never cross the
//! proxy in either mode, and `Host` is always derived from the target.

use crate::config::settings::HeaderPolicy;
use crate::utils::is_hop_by_hop_header;
use hyper::header::{
    HeaderName, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE,
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONNECTION, USER_AGENT,
};
use hyper::HeaderMap;

/// Request headers that reveal the proxy or its caller to the origin
const REQUEST_DENYLIST: [&str; 5] = ["host", "referer", "origin", "x-forwarded-for", "x-real-ip"];

/// Upstream response headers forwarded under the filtered policy
const RESPONSE_ALLOWLIST: [&str; 9] = [
    "content-type",
    "content-length",
    "content-disposition",
    "content-encoding",
    "cache-control",
    "expires",
    "last-modified",
    "etag",
    "accept-ranges",
];

/// Desktop browser identity presented upstream under the filtered policy
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Whether an inbound request header survives translation
///
/// `Host` never survives: the dispatcher derives it from the validated
/// target in both policies.
pub fn should_forward_request_header(policy: HeaderPolicy, name: &str) -> bool {
    if is_hop_by_hop_header(name) {
        return false;
    }
    let lowered = name.to_lowercase();
    if lowered == "host" {
        return false;
    }
    match policy {
        HeaderPolicy::Filtered => !REQUEST_DENYLIST.contains(&lowered.as_str()),
        HeaderPolicy::Passthrough => true,
    }
}

/// Build the header collection attached to the outbound request
pub fn build_outbound_headers(policy: HeaderPolicy, inbound: &HeaderMap) -> HeaderMap {
    let mut outbound = HeaderMap::new();

    for (name, value) in inbound {
        if should_forward_request_header(policy, name.as_str()) {
            outbound.append(name.clone(), value.clone());
        }
    }

    if policy == HeaderPolicy::Filtered {
        outbound.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        outbound.insert(ACCEPT, HeaderValue::from_static("*/*"));
        outbound.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        outbound.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate, br"));
        outbound.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    }

    outbound
}

/// Build the header collection attached to the caller-facing response
pub fn build_response_headers(policy: HeaderPolicy, upstream: &HeaderMap) -> HeaderMap {
    let mut outbound = HeaderMap::new();

    match policy {
        HeaderPolicy::Filtered => {
            for name in RESPONSE_ALLOWLIST {
                for value in upstream.get_all(name) {
                    outbound.append(HeaderName::from_static(name), value.clone());
                }
            }
            outbound.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
            outbound.insert(
                ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
            );
            outbound.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
        }
        HeaderPolicy::Passthrough => {
            for (name, value) in upstream {
                if is_hop_by_hop_header(name.as_str()) {
                    continue;
                }
                outbound.append(name.clone(), value.clone());
            }
            outbound.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        }
    }

    outbound
}
