use crate::utils::{headers_to_vec, now};
use chrono::{DateTime, Utc};
use hyper::{Body, Method, Response, Uri};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

// Core data observed on an inbound request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSummary {
    // Basic HTTP information
    pub method: String,
    pub uri: String,

    /// Normalized destination, once target resolution has succeeded
    pub target: Option<String>,

    // Client information
    pub client_ip: IpAddr,
    pub client_port: u16,

    // Timing
    pub timestamp: DateTime<Utc>,

    // Headers as received, before translation
    pub headers: Vec<(String, String)>,
}

impl RequestSummary {
    // Create a new RequestSummary from basic components
    pub fn new(method: &Method, uri: &Uri, remote_addr: SocketAddr) -> Self {
        Self {
            method: method.to_string(),
            uri: uri.to_string(),
            target: None,
            client_ip: remote_addr.ip(),
            client_port: remote_addr.port(),
            timestamp: now(),
            headers: Vec::new(),
        }
    }
}

// Upstream response data we keep for logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamSummary {
    pub status_code: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub response_time_ms: u64,
}

impl UpstreamSummary {
    pub fn new(response: &Response<Body>, response_time_ms: u64) -> Self {
        Self {
            status_code: response.status().as_u16(),
            status_text: response
                .status()
                .canonical_reason()
                .unwrap_or("")
                .to_string(),
            headers: headers_to_vec(response.headers()),
            response_time_ms,
        }
    }
}

// Complete request/upstream pair for structured logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeLog {
    pub request: RequestSummary,
    pub upstream: Option<UpstreamSummary>,
    pub error: Option<String>,
}
