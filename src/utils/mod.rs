//! Utility functions for the proxy service

pub mod http;
pub mod time;
pub mod url;

pub use http::*;
pub use time::*;
pub use url::*;
