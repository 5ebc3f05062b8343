use crate::models::ExchangeLog;
use anyhow::Result;
use chrono::Utc;
use log::{debug, error, info, trace, warn, LevelFilter};
use std::sync::Once;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

static INIT: Once = Once::new();

/// Initialize the global logger with default configuration
/// This should be called once at the start of the application
pub fn init_logger() {
    init_logger_with_config("info", false);
}

/// Initialize the global logger with configuration
///
/// `RUST_LOG` takes precedence over the configured level when set. Returns
/// the file appender guard when file logging is enabled; the caller must keep
/// it alive for the lifetime of the process or buffered lines are lost.
pub fn init_logger_with_config(log_level: &str, enable_file_logging: bool) -> Option<WorkerGuard> {
    let mut guard = None;

    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        if enable_file_logging {
            let file_appender = tracing_appender::rolling::daily("logs", "rust-url-proxy.log");
            let (writer, worker_guard) = tracing_appender::non_blocking(file_appender);

            FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_target(false)
                .with_level(true)
                .with_ansi(false)
                .with_writer(writer)
                .init();

            guard = Some(worker_guard);
        } else {
            FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_target(false)
                .with_level(true)
                .with_ansi(true)
                .init();
        }

        // Initialize LogTracer to bridge log events to tracing (after subscriber is set up)
        if let Err(e) = LogTracer::init() {
            eprintln!("Warning: Failed to initialize LogTracer: {:?}", e);
        }

        // Set the log crate's max level to match tracing
        log::set_max_level(LevelFilter::Debug);
    });

    guard
}

/// Log a proxy exchange using log (bridged to tracing via tracing-log)
pub fn log_exchange(log_entry: &ExchangeLog) -> Result<()> {
    let timestamp = Utc::now().to_rfc3339();
    let log_message = serde_json::to_string_pretty(log_entry)?;
    let formatted_message = format!("[{}] EXCHANGE:\n{}", timestamp, log_message);

    // Log using debug level so it only appears in debug mode
    debug!("{}", formatted_message);

    Ok(())
}

/// Log an error message
pub fn log_error(message: &str) {
    error!("{}", message);
}

/// Log an info message
pub fn log_info(message: &str) {
    info!("{}", message);
}

/// Log a warning message
pub fn log_warning(message: &str) {
    warn!("{}", message);
}

/// Log a debug message
pub fn log_debug(message: &str) {
    debug!("{}", message);
}

/// Log a trace message
pub fn log_trace(message: &str) {
    trace!("{}", message);
}

/// Convenience macro for logging proxy exchanges
#[macro_export]
macro_rules! log_exchange {
    ($log_entry:expr) => {
        if let Err(e) = $crate::logging::log_exchange($log_entry) {
            eprintln!("Failed to log exchange: {}", e);
        }
    };
}

/// Convenience macro for logging errors
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logging::log_error(&format!($($arg)*));
    };
}

/// Convenience macro for logging info messages
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logging::log_info(&format!($($arg)*));
    };
}

/// Convenience macro for logging warning messages
#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)*) => {
        $crate::logging::log_warning(&format!($($arg)*));
    };
}

/// Convenience macro for logging debug messages
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::logging::log_debug(&format!($($arg)*));
    };
}

/// Convenience macro for logging trace messages
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        $crate::logging::log_trace(&format!($($arg)*));
    };
}
