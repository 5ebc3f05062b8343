//! Upstream HTTP client
//!
//! One shared client with connection pooling is built at startup and reused
//! by every invocation; per-request client construction would dominate the
//! cost of small proxied exchanges.

use crate::config::settings::HttpClientConfig;
use crate::error::{Error, Result};
use hyper::client::HttpConnector;
use hyper::header::{HeaderValue, HOST, LOCATION};
use hyper::{Body, Client, HeaderMap, Method, Request, Response};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Shared upstream client, HTTPS-capable, with connection pooling
pub struct HttpClient {
    client: Client<HttpsConnector<HttpConnector>, Body>,
    max_redirects: usize,
}

impl HttpClient {
    /// Create a client with default configuration
    pub fn new() -> Self {
        Self::from_config(&HttpClientConfig::default())
    }

    /// Build the shared client from configuration
    pub fn from_config(config: &HttpClientConfig) -> Self {
        let mut http_connector = HttpConnector::new();
        http_connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
        http_connector.set_nodelay(true);
        if config.tcp_keepalive {
            http_connector
                .set_keepalive(Some(Duration::from_secs(config.tcp_keepalive_interval_secs)));
        }
        // The TLS layer decides the scheme; the inner connector must accept both
        http_connector.enforce_http(false);

        let https_connector = HttpsConnectorBuilder::new()
            .with_native_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .pool_max_idle_per_host(config.max_idle_per_host as usize)
            .build(https_connector);

        Self {
            client,
            max_redirects: config.max_redirects,
        }
    }

    /// Issue the single upstream call for an inbound request
    ///
    /// Redirects are followed up to the configured hop limit for bodyless
    /// methods (GET/HEAD). A request whose body stream was consumed by the
    /// first hop cannot be replayed, so its 3xx response is surfaced to the
    /// caller unchanged. No call is ever retried.
    pub async fn dispatch(
        &self,
        method: Method,
        target: Url,
        headers: HeaderMap,
        body: Body,
    ) -> Result<Response<Body>> {
        let bodyless = method == Method::GET || method == Method::HEAD;
        let mut url = target;
        let mut body = Some(body);
        let mut hops = 0;

        loop {
            let mut request = Request::builder()
                .method(method.clone())
                .uri(url.as_str())
                .body(if bodyless {
                    Body::empty()
                } else {
                    body.take().unwrap_or_else(Body::empty)
                })?;
            *request.headers_mut() = headers.clone();
            request.headers_mut().insert(HOST, host_header_value(&url)?);

            debug!("dispatching {} {}", request.method(), request.uri());
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| Error::Upstream(e.to_string()))?;

            if bodyless && response.status().is_redirection() && hops < self.max_redirects {
                if let Some(next) = redirect_location(&url, response.headers()) {
                    debug!("following {} redirect to {}", response.status(), next);
                    url = next;
                    hops += 1;
                    continue;
                }
            }

            return Ok(response);
        }
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Host header for the target, omitting the port when it is the scheme default
fn host_header_value(url: &Url) -> Result<HeaderValue> {
    let host = url
        .host_str()
        .ok_or_else(|| Error::Unexpected(format!("target URL '{}' has no host", url)))?;
    let value = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    HeaderValue::from_str(&value)
        .map_err(|e| Error::Unexpected(format!("invalid host header '{}': {}", value, e)))
}

/// Resolve a Location header against the current hop, http/https only
fn redirect_location(base: &Url, headers: &HeaderMap) -> Option<Url> {
    let location = headers.get(LOCATION)?.to_str().ok()?;
    let next = base.join(location).ok()?;
    matches!(next.scheme(), "http" | "https").then_some(next)
}
