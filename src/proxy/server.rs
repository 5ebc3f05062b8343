//! Proxy server implementation
//!
//! One hyper service invocation per inbound request. The pipeline is a
//! single linear pass: self-test short-circuit, target resolution, header
//! translation, one upstream dispatch, then either the streamed response,
//! the debug report, or an error response. Every outcome, panics included,
//! becomes a well-formed HTTP response at the top-level boundary here.

use crate::config::settings::{HeaderPolicy, ProxyConfig};
use crate::error::{Error, Result};
use crate::log_exchange;
use crate::models::{ExchangeLog, RequestSummary, UpstreamSummary};
use crate::proxy::headers::{build_outbound_headers, build_response_headers};
use crate::proxy::http_client::HttpClient;
use crate::proxy::resolver::resolve_target;
use crate::proxy::trace::TraceLog;
use crate::utils::{duration_to_ms, headers_to_vec, plain_text_response, query_flag};
use crate::{log_debug, log_info};
use futures::FutureExt;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, HeaderMap, Method, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};
use url::Url;

/// Echo endpoint contacted by the `test=1` liveness self-check
const SELF_TEST_URL: &str = "https://httpbin.org/get";

/// Immutable state shared by every invocation
///
/// Holds no mutable data: concurrent invocations only read the policy and
/// reuse the pooled client.
pub struct ProxyState {
    pub policy: HeaderPolicy,
    pub client: HttpClient,
    pub self_test_url: String,
}

impl ProxyState {
    pub fn new(policy: HeaderPolicy, client: HttpClient) -> Self {
        Self {
            policy,
            client,
            self_test_url: SELF_TEST_URL.to_string(),
        }
    }
}

pub struct ProxyServer {
    listen_addr: SocketAddr,
    state: Arc<ProxyState>,
}

impl ProxyServer {
    /// Create a proxy server from configuration
    pub fn with_config(config: &ProxyConfig) -> Self {
        Self {
            listen_addr: config.listen_addr,
            state: Arc::new(ProxyState::new(
                config.header_policy,
                HttpClient::from_config(&config.http_client),
            )),
        }
    }

    /// Start the proxy server
    pub async fn start(self) -> anyhow::Result<()> {
        info!("Starting proxy server on {}", self.listen_addr);
        log_debug!(
            "Server configuration: listen_addr={}, policy={}",
            self.listen_addr,
            self.state.policy
        );

        let state = Arc::clone(&self.state);
        let make_svc = make_service_fn(move |conn: &hyper::server::conn::AddrStream| {
            let remote_addr = conn.remote_addr();
            let state = Arc::clone(&state);
            log_debug!("New connection from: {}", remote_addr);

            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    let state = Arc::clone(&state);
                    async move { handle_request(req, remote_addr, state).await }
                }))
            }
        });

        let server = Server::bind(&self.listen_addr).serve(make_svc);
        log_info!("Server bound successfully, waiting for connections");

        if let Err(e) = server.await {
            error!("Server error: {}", e);
        }

        Ok(())
    }
}

/// Handle one inbound request
///
/// The single error boundary: pipeline failures and panics are both
/// converted into the plain-text response contract, so nothing ever escapes
/// to the connection layer.
pub async fn handle_request(
    req: Request<Body>,
    remote_addr: SocketAddr,
    state: Arc<ProxyState>,
) -> Result<Response<Body>, Infallible> {
    let start_time = Instant::now();
    let method = req.method().to_string();
    let uri = req.uri().to_string();

    info!("📥 {} {} from {}", method, uri_snippet(&uri), remote_addr.ip());

    let mut trace = TraceLog::new();
    let outcome = AssertUnwindSafe(proxy_pipeline(req, remote_addr, &state, &mut trace))
        .catch_unwind()
        .await;

    let response = match outcome {
        Ok(Ok(response)) => {
            info!(
                "✅ {} {} → {} ({}ms)",
                method,
                uri_snippet(&uri),
                response.status(),
                start_time.elapsed().as_millis()
            );
            response
        }
        Ok(Err(err)) => {
            info!(
                "❌ {} {} → {} ({}ms): {}",
                method,
                uri_snippet(&uri),
                err.status(),
                start_time.elapsed().as_millis(),
                err
            );
            error_response(&err, &trace)
        }
        Err(panic) => {
            let message = panic_message(panic);
            error!("❌ {} {} panicked: {}", method, uri_snippet(&uri), message);
            error_response(&Error::Unexpected(message), &trace)
        }
    };

    Ok(response)
}

/// The linear proxy pipeline for one invocation
async fn proxy_pipeline(
    req: Request<Body>,
    remote_addr: SocketAddr,
    state: &ProxyState,
    trace: &mut TraceLog,
) -> Result<Response<Body>> {
    let (parts, body) = req.into_parts();
    let method = parts.method.clone();
    let path = parts.uri.path().to_string();
    let query = parts.uri.query().map(|q| q.to_string());

    trace.record("request received");
    trace.record_kv("request method", &method);
    trace.record_kv("request path", &path);
    if let Some(q) = &query {
        trace.record_kv("request query", q);
    }

    let mut summary = RequestSummary::new(&method, &parts.uri, remote_addr);
    summary.headers = headers_to_vec(&parts.headers);

    if query_flag(query.as_deref(), "test") {
        // Liveness self-check: the caller-specified target is never resolved
        // or contacted in this mode.
        return run_self_test(state, trace).await;
    }

    let target = resolve_target(&path, query.as_deref()).map_err(|err| {
        trace.record_kv("target resolution failed", &err);
        err
    })?;
    trace.record_kv("resolved target", target.as_str());
    summary.target = Some(target.as_str().to_string());

    let outbound_headers = build_outbound_headers(state.policy, &parts.headers);
    trace.record_kv("outbound header count", outbound_headers.len());
    for (name, value) in headers_to_vec(&outbound_headers) {
        trace.record(format!("outbound header {}: {}", name, value));
    }

    // GET/HEAD carry no body upstream; everything else streams through
    let outbound_body = if method == Method::GET || method == Method::HEAD {
        Body::empty()
    } else {
        body
    };

    trace.record("dispatching upstream request");
    let upstream_start = Instant::now();
    let upstream = state
        .client
        .dispatch(method.clone(), target, outbound_headers, outbound_body)
        .await
        .map_err(|err| {
            trace.record_kv("upstream dispatch failed", &err);
            log_exchange!(&ExchangeLog {
                request: summary.clone(),
                upstream: None,
                error: Some(err.to_string()),
            });
            err
        })?;

    let upstream_time = duration_to_ms(upstream_start.elapsed());
    trace.record_kv("upstream status", upstream.status());
    debug!("📤 Upstream response: {} ({}ms)", upstream.status(), upstream_time);

    log_exchange!(&ExchangeLog {
        request: summary,
        upstream: Some(UpstreamSummary::new(&upstream, upstream_time)),
        error: None,
    });

    if query_flag(query.as_deref(), "debug") {
        for (name, value) in headers_to_vec(upstream.headers()) {
            trace.record(format!("upstream header {}: {}", name, value));
        }
        trace.record("debug mode: returning trace instead of upstream body");
        return Ok(plain_text_response(
            StatusCode::OK,
            format!("debug report:\n{}", trace.render()),
        ));
    }

    Ok(translate_response(state.policy, upstream))
}

/// Build the streamed caller response from the upstream response
///
/// The upstream body is moved, not buffered: bytes flow to the caller as
/// the upstream delivers them.
fn translate_response(policy: HeaderPolicy, upstream: Response<Body>) -> Response<Body> {
    let (parts, body) = upstream.into_parts();
    let mut response = Response::new(body);
    *response.status_mut() = parts.status;
    *response.headers_mut() = build_response_headers(policy, &parts.headers);
    response
}

/// Liveness self-check against the fixed echo endpoint
async fn run_self_test(state: &ProxyState, trace: &mut TraceLog) -> Result<Response<Body>> {
    trace.record_kv("self-test requested, contacting", &state.self_test_url);

    let url = Url::parse(&state.self_test_url).map_err(|e| {
        Error::Config(format!(
            "invalid self-test endpoint '{}': {}",
            state.self_test_url, e
        ))
    })?;

    match state
        .client
        .dispatch(Method::GET, url, HeaderMap::new(), Body::empty())
        .await
    {
        Ok(response) => {
            let status = response.status();
            trace.record_kv("self-test status", status);
            let body = hyper::body::to_bytes(response.into_body())
                .await
                .map_err(|e| Error::Upstream(e.to_string()))?;
            let text = String::from_utf8_lossy(&body);
            Ok(plain_text_response(
                StatusCode::OK,
                format!(
                    "self-test succeeded: {}\n{}\n\ndebug log:\n{}",
                    status,
                    text,
                    trace.render()
                ),
            ))
        }
        Err(err) => {
            trace.record_kv("self-test failed", &err);
            Ok(plain_text_response(
                StatusCode::OK,
                format!("self-test failed: {}\n\ndebug log:\n{}", err, trace.render()),
            ))
        }
    }
}

/// Convert a pipeline failure into the plain-text response contract
fn error_response(err: &Error, trace: &TraceLog) -> Response<Body> {
    let status = err.status();
    let message = if status.is_server_error() {
        format!("proxy request failed: {}", err)
    } else {
        err.to_string()
    };
    let body = if trace.is_empty() {
        message
    } else {
        format!("{}\n\ndebug log:\n{}", message, trace.render())
    };
    plain_text_response(status, body)
}

fn uri_snippet(uri: &str) -> String {
    uri.chars().take(64).collect()
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    #[test]
    fn error_response_uses_client_status_for_target_rejections() {
        let trace = TraceLog::new();
        let response = error_response(&Error::EmptyTarget, &trace);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn error_response_prefixes_server_failures() {
        let mut trace = TraceLog::new();
        trace.record("step one");

        let err = Error::Upstream("connection reset".to_string());
        let response = error_response(&err, &trace);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = futures::executor::block_on(hyper::body::to_bytes(response.into_body()))
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.starts_with("proxy request failed:"));
        assert!(text.contains("connection reset"));
        assert!(text.contains("debug log:\nstep one"));
    }

    #[test]
    fn translate_response_copies_status_verbatim() {
        let mut upstream = Response::new(Body::empty());
        *upstream.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
        upstream
            .headers_mut()
            .insert("x-upstream-internal", HeaderValue::from_static("1"));

        let response = translate_response(HeaderPolicy::Filtered, upstream);
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().get("x-upstream-internal").is_none());
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }

    #[test]
    fn panic_message_extracts_str_payloads() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload), "boom");

        let payload: Box<dyn std::any::Any + Send> = Box::new("dynamic".to_string());
        assert_eq!(panic_message(payload), "dynamic");
    }
}
