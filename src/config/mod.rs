//! Configuration module

pub mod settings;

pub use settings::{HeaderPolicy, HttpClientConfig, LoggingConfig, ProxyConfig};
