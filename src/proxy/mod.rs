//! Proxy pipeline module

pub mod headers;
pub mod http_client;
pub mod resolver;
pub mod server;
pub mod trace;

// Re-exports
pub use http_client::HttpClient;
pub use server::{ProxyServer, ProxyState};
pub use trace::TraceLog;
