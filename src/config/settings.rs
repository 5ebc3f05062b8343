//! Proxy service configuration settings

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;

/// Header translation policy applied to both directions of a proxied exchange
///
/// `Filtered` strips identifying request headers and presents a browser-like
/// header set upstream, and forwards only a fixed allowlist of response
/// headers back. `Passthrough` copies headers unchanged in both directions.
/// Both modes add CORS headers to the caller-facing response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderPolicy {
    Filtered,
    Passthrough,
}

impl fmt::Display for HeaderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderPolicy::Filtered => write!(f, "filtered"),
            HeaderPolicy::Passthrough => write!(f, "passthrough"),
        }
    }
}

impl FromStr for HeaderPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "filtered" => Ok(HeaderPolicy::Filtered),
            "passthrough" => Ok(HeaderPolicy::Passthrough),
            other => Err(anyhow::anyhow!(
                "unknown header policy '{}' (expected 'filtered' or 'passthrough')",
                other
            )),
        }
    }
}

/// Main configuration for the proxy service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Server listening address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Log level configuration
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Header translation policy
    #[serde(default = "default_header_policy")]
    pub header_policy: HeaderPolicy,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// HTTP client configuration
    #[serde(default)]
    pub http_client: HttpClientConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable file logging (default: false, console only)
    #[serde(default)]
    pub enable_file_logging: bool,
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// Maximum idle connections per host
    #[serde(default = "default_max_idle_per_host")]
    pub max_idle_per_host: u32,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Enable TCP keepalive
    #[serde(default = "default_tcp_keepalive")]
    pub tcp_keepalive: bool,

    /// TCP keepalive interval in seconds
    #[serde(default = "default_tcp_keepalive_interval_secs")]
    pub tcp_keepalive_interval_secs: u64,

    /// Maximum redirect hops followed for bodyless requests
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

fn default_listen_addr() -> SocketAddr {
    "127.0.0.1:8080".parse().unwrap()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_header_policy() -> HeaderPolicy {
    HeaderPolicy::Filtered
}

fn default_max_idle_per_host() -> u32 {
    50
}

fn default_idle_timeout_secs() -> u64 {
    90
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_tcp_keepalive() -> bool {
    true
}

fn default_tcp_keepalive_interval_secs() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    10
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            log_level: default_log_level(),
            header_policy: default_header_policy(),
            logging: LoggingConfig::default(),
            http_client: HttpClientConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_file_logging: false,
        }
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: default_max_idle_per_host(),
            idle_timeout_secs: default_idle_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            tcp_keepalive: default_tcp_keepalive(),
            tcp_keepalive_interval_secs: default_tcp_keepalive_interval_secs(),
            max_redirects: default_max_redirects(),
        }
    }
}

impl ProxyConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: ProxyConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Load configuration from `config.yml` when present, with environment
    /// variable overrides
    pub fn load_config() -> Result<Self> {
        let config_path = "config.yml";

        let mut config = if Path::new(config_path).exists() {
            Self::from_yaml_file(config_path)?
        } else {
            Self::default()
        };

        if let Ok(addr_str) = std::env::var("PROXY_LISTEN_ADDR") {
            config.listen_addr = addr_str
                .parse()
                .with_context(|| format!("Invalid PROXY_LISTEN_ADDR '{}'", addr_str))?;
        }

        if let Ok(log_level) = std::env::var("RUST_LOG") {
            config.log_level = log_level;
        }

        if let Ok(policy) = std::env::var("PROXY_HEADER_POLICY") {
            config.header_policy = policy.parse()?;
        }

        if let Ok(max_redirects) = std::env::var("PROXY_MAX_REDIRECTS") {
            config.http_client.max_redirects = max_redirects
                .parse()
                .with_context(|| format!("Invalid PROXY_MAX_REDIRECTS '{}'", max_redirects))?;
        }

        Ok(config)
    }
}
