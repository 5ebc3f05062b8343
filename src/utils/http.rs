//! HTTP utility functions

use hyper::{Body, HeaderMap, Response, StatusCode};

/// Check if a header is a hop-by-hop header
pub fn is_hop_by_hop_header(name: &str) -> bool {
    let hop_by_hop_headers = [
        "connection",
        "keep-alive",
        "proxy-authenticate",
        "proxy-authorization",
        "te",
        "trailers",
        "transfer-encoding",
        "upgrade",
    ];

    hop_by_hop_headers.contains(&name.to_lowercase().as_str())
}

/// Build a plain-text response with the charset the proxy always reports
pub fn plain_text_response(status: StatusCode, body: String) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("content-type", "text/plain; charset=utf-8")
        .body(Body::from(body))
        .unwrap()
}

/// Flatten a header map into displayable (name, value) pairs
///
/// Repeated names are preserved, one pair per value; values that are not
/// valid UTF-8 are skipped.
pub fn headers_to_vec(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}
