//! Main entry point for the Rust URL Proxy

use clap::Parser;
use rust_url_proxy::{
    init_logger_with_config, log_info, HeaderPolicy, ProxyConfig, ProxyServer,
};

#[derive(Parser)]
#[command(name = "rust-url-proxy")]
#[command(about = "A stateless path-addressed HTTP forwarding proxy")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(long)]
    config: Option<String>,

    /// Listen address, overriding the configuration file
    #[arg(long)]
    listen: Option<String>,

    /// Header policy: filtered or passthrough
    #[arg(long)]
    policy: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // File/env configuration first, CLI flags on top
    let mut config = match &cli.config {
        Some(path) => ProxyConfig::from_yaml_file(path)?,
        None => ProxyConfig::load_config()?,
    };
    if let Some(listen) = &cli.listen {
        config.listen_addr = listen.parse()?;
    }
    if let Some(policy) = &cli.policy {
        config.header_policy = policy.parse::<HeaderPolicy>()?;
    }
    if cli.log_level != "info" {
        config.log_level = cli.log_level.clone();
    }

    // The file appender guard must outlive the server
    let _guard = init_logger_with_config(&config.log_level, config.logging.enable_file_logging);

    log_info!("Starting Rust URL Proxy");
    log_info!("Proxy server starting on {}", config.listen_addr);
    log_info!("Header policy: {}", config.header_policy);
    log_info!("Test with: curl http://{}/example.com", config.listen_addr);

    ProxyServer::with_config(&config).start().await
}
