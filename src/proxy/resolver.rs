//! Target URL resolution
//!
//! The inbound path encodes the destination: everything after the leading
//! slash is the target, and the inbound query string is carried along
//! verbatim. Targets without an explicit `http://`/`https://` prefix default
//! to `https://`.

use crate::error::{Error, Result};
use crate::utils::has_http_scheme_prefix;
use url::Url;

/// Resolve the inbound path and query string into a validated target URL
///
/// The returned URL is the normalized form (`Url::as_str`); downstream code
/// never sees the raw target string. A target that embeds its own query
/// string and also receives the inbound query ends up with both concatenated
/// (`?a=1?b=2`). That is the contract, not a defect.
pub fn resolve_target(path: &str, query: Option<&str>) -> Result<Url> {
    let mut raw = path.strip_prefix('/').unwrap_or(path).to_string();
    if let Some(q) = query {
        raw.push('?');
        raw.push_str(q);
    }

    if raw.is_empty() {
        return Err(Error::EmptyTarget);
    }

    let candidate = if has_http_scheme_prefix(&raw) {
        raw
    } else {
        reject_foreign_scheme(&raw)?;
        format!("https://{}", raw)
    };

    let target = Url::parse(&candidate)?;
    match target.scheme() {
        "http" | "https" => Ok(target),
        other => Err(Error::DisallowedScheme(other.to_string())),
    }
}

/// Reject targets that spell out their own non-HTTP `scheme://`
///
/// The default-scheme rewrite would otherwise turn `ftp://host` into
/// `https://ftp//host` and forward it to a host named `ftp`. A bare
/// `scheme:` without slashes (e.g. `localhost:8080`) is left alone and goes
/// through the rewrite.
fn reject_foreign_scheme(raw: &str) -> Result<()> {
    if let Ok(parsed) = Url::parse(raw) {
        let scheme = parsed.scheme();
        let rest = raw.get(scheme.len()..).unwrap_or("");
        if rest.starts_with("://") {
            return Err(Error::DisallowedScheme(scheme.to_string()));
        }
    }
    Ok(())
}
