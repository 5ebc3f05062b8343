//! End-to-end tests driving the request pipeline against local mock upstreams

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use hyper::body::HttpBody;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, HeaderMap, Request, Response, Server, StatusCode};

use rust_url_proxy::{handle_request, HeaderPolicy, HttpClient, ProxyState};

fn test_state(policy: HeaderPolicy) -> Arc<ProxyState> {
    Arc::new(ProxyState::new(policy, HttpClient::new()))
}

async fn proxy(state: &Arc<ProxyState>, method: &str, path_and_query: &str) -> Response<Body> {
    proxy_with_body(state, method, path_and_query, Body::empty()).await
}

async fn proxy_with_body(
    state: &Arc<ProxyState>,
    method: &str,
    path_and_query: &str,
    body: Body,
) -> Response<Body> {
    let req = Request::builder()
        .method(method)
        .uri(path_and_query)
        .body(body)
        .unwrap();
    let remote: SocketAddr = "127.0.0.1:49152".parse().unwrap();
    handle_request(req, remote, Arc::clone(state)).await.unwrap()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Spawn a mock upstream on an ephemeral port; returns its address and a
/// counter of requests it actually received.
async fn spawn_upstream<F>(handler: F) -> (SocketAddr, Arc<AtomicUsize>)
where
    F: Fn(Request<Body>) -> Response<Body> + Send + Sync + 'static,
{
    let handler = Arc::new(handler);
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_for_service = Arc::clone(&hits);

    let make_svc = make_service_fn(move |_| {
        let handler = Arc::clone(&handler);
        let hits = Arc::clone(&hits_for_service);
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let handler = Arc::clone(&handler);
                let hits = Arc::clone(&hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Infallible>(handler(req))
                }
            }))
        }
    });

    let server = Server::bind(&"127.0.0.1:0".parse().unwrap()).serve(make_svc);
    let addr = server.local_addr();
    tokio::spawn(server);
    (addr, hits)
}

#[tokio::test]
async fn forwards_to_resolved_target_and_adds_cors() {
    let (addr, hits) = spawn_upstream(|req| {
        assert_eq!(req.uri().path_and_query().unwrap().as_str(), "/path?x=1");
        Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "text/plain")
            .body(Body::from("ok"))
            .unwrap()
    })
    .await;

    let state = test_state(HeaderPolicy::Filtered);
    let response = proxy(&state, "GET", &format!("/http://{}/path?x=1", addr)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
    assert_eq!(response.headers().get("content-type").unwrap(), "text/plain");
    assert_eq!(body_text(response).await, "ok");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_target_is_rejected_before_any_dispatch() {
    let state = test_state(HeaderPolicy::Filtered);
    let response = proxy(&state, "GET", "/").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/plain; charset=utf-8"
    );
    assert!(body_text(response).await.contains("empty target"));
}

#[tokio::test]
async fn disallowed_scheme_never_contacts_upstream() {
    let (addr, hits) = spawn_upstream(|_| Response::new(Body::from("should not be seen"))).await;

    let state = test_state(HeaderPolicy::Filtered);
    let response = proxy(&state, "GET", &format!("/ftp://{}/file", addr)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("disallowed scheme"));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn malformed_target_is_rejected() {
    let state = test_state(HeaderPolicy::Filtered);
    let response = proxy(&state, "GET", "/http://").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("invalid target URL"));
}

#[tokio::test]
async fn debug_mode_returns_trace_instead_of_upstream_body() {
    let (addr, _) = spawn_upstream(|_| {
        Response::builder()
            .status(StatusCode::OK)
            .header("x-upstream-secret", "1")
            .body(Body::from("the actual payload"))
            .unwrap()
    })
    .await;

    let state = test_state(HeaderPolicy::Filtered);
    let response = proxy(&state, "GET", &format!("/http://{}/data?debug=1", addr)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/plain; charset=utf-8"
    );

    let text = body_text(response).await;
    assert!(text.starts_with("debug report:"));
    assert!(text.contains("resolved target"));
    assert!(text.contains("upstream status: 200"));
    assert!(text.contains("upstream header x-upstream-secret: 1"));
    assert!(!text.contains("the actual payload"));
}

#[tokio::test]
async fn upstream_connection_failure_maps_to_internal_error() {
    // Grab a port with no listener behind it
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let state = test_state(HeaderPolicy::Filtered);
    let response = proxy(&state, "GET", &format!("/http://{}/", addr)).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let text = body_text(response).await;
    assert!(text.contains("proxy request failed"));
}

#[tokio::test]
async fn upstream_error_status_passes_through_verbatim() {
    let (addr, _) = spawn_upstream(|_| {
        Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::from("missing"))
            .unwrap()
    })
    .await;

    let state = test_state(HeaderPolicy::Filtered);
    let response = proxy(&state, "GET", &format!("/http://{}/nope", addr)).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, "missing");
}

#[tokio::test]
async fn repeated_gets_are_independent_and_identical() {
    let (addr, hits) = spawn_upstream(|_| Response::new(Body::from("same"))).await;

    let state = test_state(HeaderPolicy::Filtered);
    let first = proxy(&state, "GET", &format!("/http://{}/page", addr)).await;
    let second = proxy(&state, "GET", &format!("/http://{}/page", addr)).await;

    assert_eq!(first.status(), second.status());
    assert_eq!(body_text(first).await, body_text(second).await);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn response_streams_before_upstream_completes() {
    let (addr, _) = spawn_upstream(|_| {
        let (mut sender, body) = Body::channel();
        tokio::spawn(async move {
            sender.send_data(Bytes::from_static(b"first")).await.ok();
            tokio::time::sleep(Duration::from_millis(800)).await;
            sender.send_data(Bytes::from_static(b"rest")).await.ok();
        });
        Response::new(body)
    })
    .await;

    let state = test_state(HeaderPolicy::Filtered);
    let started = Instant::now();
    let response = proxy(&state, "GET", &format!("/http://{}/stream", addr)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut body = response.into_body();
    let first = body.data().await.unwrap().unwrap();
    assert_eq!(&first[..], b"first");
    // The first bytes must arrive while the upstream transfer is still open
    assert!(
        started.elapsed() < Duration::from_millis(500),
        "first byte arrived only after {:?}",
        started.elapsed()
    );

    let mut rest = Vec::new();
    while let Some(chunk) = body.data().await {
        rest.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(rest, b"rest");
}

#[tokio::test]
async fn filtered_policy_rewrites_outbound_headers() {
    let seen: Arc<Mutex<Option<HeaderMap>>> = Arc::new(Mutex::new(None));
    let seen_in_handler = Arc::clone(&seen);
    let (addr, _) = spawn_upstream(move |req| {
        *seen_in_handler.lock().unwrap() = Some(req.headers().clone());
        Response::new(Body::from("ok"))
    })
    .await;

    let state = test_state(HeaderPolicy::Filtered);
    let req = Request::builder()
        .method("GET")
        .uri(format!("/http://{}/check", addr))
        .header("user-agent", "curl/8.0")
        .header("referer", "https://proxy.example/")
        .header("x-forwarded-for", "10.0.0.1")
        .header("x-api-key", "secret")
        .body(Body::empty())
        .unwrap();
    let remote: SocketAddr = "127.0.0.1:49152".parse().unwrap();
    let response = handle_request(req, remote, Arc::clone(&state)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = seen.lock().unwrap().clone().unwrap();
    let user_agent = headers.get("user-agent").unwrap().to_str().unwrap();
    assert!(user_agent.starts_with("Mozilla/5.0"));
    assert!(headers.get("referer").is_none());
    assert!(headers.get("x-forwarded-for").is_none());
    assert_eq!(headers.get("x-api-key").unwrap(), "secret");
    assert_eq!(headers.get("host").unwrap(), &format!("{}", addr));
}

#[tokio::test]
async fn passthrough_policy_keeps_outbound_headers() {
    let seen: Arc<Mutex<Option<HeaderMap>>> = Arc::new(Mutex::new(None));
    let seen_in_handler = Arc::clone(&seen);
    let (addr, _) = spawn_upstream(move |req| {
        *seen_in_handler.lock().unwrap() = Some(req.headers().clone());
        Response::new(Body::from("ok"))
    })
    .await;

    let state = test_state(HeaderPolicy::Passthrough);
    let req = Request::builder()
        .method("GET")
        .uri(format!("/http://{}/check", addr))
        .header("user-agent", "custom-agent")
        .header("x-custom-token", "abc")
        .body(Body::empty())
        .unwrap();
    let remote: SocketAddr = "127.0.0.1:49152".parse().unwrap();
    let response = handle_request(req, remote, Arc::clone(&state)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = seen.lock().unwrap().clone().unwrap();
    assert_eq!(headers.get("user-agent").unwrap(), "custom-agent");
    assert_eq!(headers.get("x-custom-token").unwrap(), "abc");
}

#[tokio::test]
async fn passthrough_policy_forwards_upstream_response_headers() {
    let (addr, _) = spawn_upstream(|_| {
        Response::builder()
            .header("x-upstream-extra", "yes")
            .body(Body::from("ok"))
            .unwrap()
    })
    .await;

    let passthrough = test_state(HeaderPolicy::Passthrough);
    let response = proxy(&passthrough, "GET", &format!("/http://{}/h", addr)).await;
    assert_eq!(response.headers().get("x-upstream-extra").unwrap(), "yes");
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
    assert!(response.headers().get("access-control-allow-methods").is_none());

    let filtered = test_state(HeaderPolicy::Filtered);
    let response = proxy(&filtered, "GET", &format!("/http://{}/h", addr)).await;
    assert!(response.headers().get("x-upstream-extra").is_none());
    assert_eq!(
        response.headers().get("access-control-allow-methods").unwrap(),
        "GET, POST, PUT, DELETE, OPTIONS"
    );
}

#[tokio::test]
async fn post_body_streams_through_to_upstream() {
    // Echo upstream: the request body stream becomes the response body
    let (addr, _) = spawn_upstream(|req| Response::new(req.into_body())).await;

    let state = test_state(HeaderPolicy::Filtered);
    let response = proxy_with_body(
        &state,
        "POST",
        &format!("/http://{}/echo", addr),
        Body::from("hello upstream"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "hello upstream");
}

#[tokio::test]
async fn bodyless_redirects_are_followed() {
    let (addr, hits) = spawn_upstream(|req| match req.uri().path() {
        "/old" => Response::builder()
            .status(StatusCode::FOUND)
            .header("location", "/new")
            .body(Body::empty())
            .unwrap(),
        "/new" => Response::new(Body::from("final")),
        other => panic!("unexpected path {}", other),
    })
    .await;

    let state = test_state(HeaderPolicy::Filtered);
    let response = proxy(&state, "GET", &format!("/http://{}/old", addr)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "final");
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn self_test_bypasses_the_requested_target() {
    let (addr, hits) = spawn_upstream(|req| {
        assert_eq!(req.uri().path(), "/get");
        Response::new(Body::from("echo-ok"))
    })
    .await;

    let mut state = ProxyState::new(HeaderPolicy::Filtered, HttpClient::new());
    state.self_test_url = format!("http://{}/get", addr);
    let state = Arc::new(state);

    // The caller-specified target does not exist; it must never be resolved
    let response = proxy(&state, "GET", "/unreachable.invalid/path?test=1").await;

    assert_eq!(response.status(), StatusCode::OK);
    let text = body_text(response).await;
    assert!(text.contains("self-test succeeded"));
    assert!(text.contains("echo-ok"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
