//! Error handling module for the proxy service

use hyper::StatusCode;
use thiserror::Error;

/// Custom error type for the proxy service
#[derive(Error, Debug)]
pub enum Error {
    #[error("empty target: the request path does not name a destination URL")]
    EmptyTarget,

    #[error("invalid target URL: {0}")]
    MalformedTarget(#[from] url::ParseError),

    #[error("disallowed scheme '{0}': only http and https targets are forwarded")]
    DisallowedScheme(String),

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("HTTP error: {0}")]
    Http(#[from] hyper::http::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Unexpected(String),
}

/// Result type for the proxy service
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// HTTP status reported to the caller for this failure
    ///
    /// Target rejections are user-correctable; everything else is a proxy
    /// failure. Upstream 4xx/5xx responses never pass through here, they are
    /// forwarded verbatim.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::EmptyTarget | Error::MalformedTarget(_) | Error::DisallowedScheme(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Unexpected(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_rejections_map_to_bad_request() {
        assert_eq!(Error::EmptyTarget.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::DisallowedScheme("ftp".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn dispatch_failures_map_to_internal_error() {
        assert_eq!(
            Error::Upstream("connection refused".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::Unexpected("oops".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
