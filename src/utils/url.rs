//! URL utility functions

/// Check whether the query string sets `name=1`
///
/// Mode switches (`debug=1`, `test=1`) are read from the inbound query
/// string; the same query remains part of the forwarded target.
pub fn query_flag(query: Option<&str>, name: &str) -> bool {
    match query {
        Some(q) => form_urlencoded::parse(q.as_bytes()).any(|(k, v)| k == name && v == "1"),
        None => false,
    }
}

/// Check for the exact scheme prefixes accepted without rewriting
pub fn has_http_scheme_prefix(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://")
}
