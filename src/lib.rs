//! Rust URL Proxy - A stateless path-addressed HTTP forwarding proxy
//!
//! The request path encodes the destination URL: `GET /example.com/page`
//! forwards to `https://example.com/page` and streams the answer back with
//! permissive CORS headers attached. A `debug=1` query parameter swaps the
//! streamed body for a plain-text trace of the translation steps.

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod proxy;
pub mod utils;

// Re-export commonly used items
pub use config::settings::{HeaderPolicy, ProxyConfig};
pub use error::{Error, Result};
pub use logging::{
    init_logger, init_logger_with_config, log_debug, log_error, log_exchange, log_info, log_trace,
    log_warning,
};
pub use models::{ExchangeLog, RequestSummary, UpstreamSummary};
pub use proxy::http_client::HttpClient;
pub use proxy::resolver::resolve_target;
pub use proxy::server::{handle_request, ProxyServer, ProxyState};
pub use proxy::trace::TraceLog;
