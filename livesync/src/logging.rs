//! Logging setup for hosts embedding livesync
//!
//! The library only emits `tracing` events; nothing in the coordinator
//! depends on a subscriber being installed. Hosts that want output call one
//! of the `init_*` functions once at startup.

use std::str::FromStr;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Output style for the installed subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No subscriber; events are discarded
    Silent,
    /// Compact stderr output at `info`
    Development,
    /// Pretty output with source locations at `debug`
    Debug,
    /// One JSON object per line, for log shippers
    Json,
}

impl FromStr for LoggingMode {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "silent" | "off" => Ok(LoggingMode::Silent),
            "development" | "dev" => Ok(LoggingMode::Development),
            "debug" => Ok(LoggingMode::Debug),
            "json" => Ok(LoggingMode::Json),
            other => Err(LoggingError::InvalidEnv(format!(
                "unknown logging mode '{other}'"
            ))),
        }
    }
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid environment variable: {0}")]
    InvalidEnv(String),
}

/// Install a global subscriber for `mode`
///
/// # Environment Variables
///
/// - `LIVESYNC_LOG_LEVEL`: filter directives (e.g. `livesync=debug`)
/// - `RUST_LOG`: used when `LIVESYNC_LOG_LEVEL` is unset
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    let result = match mode {
        LoggingMode::Silent => return Ok(()),
        LoggingMode::Development => Registry::default()
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .compact(),
            )
            .with(env_filter("info"))
            .try_init(),
        LoggingMode::Debug => Registry::default()
            .with(
                fmt::layer()
                    .pretty()
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(env_filter("debug"))
            .try_init(),
        LoggingMode::Json => Registry::default()
            .with(fmt::layer().json().with_current_span(false))
            .with(env_filter("info"))
            .try_init(),
    };

    result.map_err(|e| LoggingError::TracingInit(e.to_string()))
}

/// Initialize from `LIVESYNC_LOG_MODE`
///
/// Unset means [`LoggingMode::Silent`]; an unrecognized value is an error.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    match std::env::var("LIVESYNC_LOG_MODE") {
        Ok(value) => init_logging(value.parse()?),
        Err(_) => init_logging(LoggingMode::Silent),
    }
}

/// Equivalent to `init_logging(LoggingMode::Silent)`
pub fn init_silent() -> Result<(), LoggingError> {
    init_logging(LoggingMode::Silent)
}

/// Whether a global subscriber has already been installed
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}

fn env_filter(default_level: &str) -> EnvFilter {
    std::env::var("LIVESYNC_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new(default_level))
}
