//! Tracing initialization with a runtime-reloadable level filter.
//!
//! The agent's heartbeat can carry an operator-requested log level;
//! [`LogHandle::set_level`] applies it without restarting.

use thiserror::Error;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::reload;
use tracing_subscriber::util::SubscriberInitExt;

use crate::domain::models::LoggingConfig;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log level {0:?}")]
    InvalidLevel(String),
    #[error("logging already initialized")]
    AlreadyInitialized,
}

/// Handle for changing the active level filter at runtime.
#[derive(Clone)]
pub struct LogHandle {
    reload: reload::Handle<EnvFilter, tracing_subscriber::Registry>,
}

impl LogHandle {
    pub fn set_level(&self, level: &str) -> Result<(), LoggingError> {
        let filter = parse_level(level)?;
        self.reload
            .reload(filter)
            .map_err(|_| LoggingError::AlreadyInitialized)?;
        tracing::info!(level, "log level changed");
        Ok(())
    }
}

fn parse_level(level: &str) -> Result<EnvFilter, LoggingError> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(EnvFilter::new(level.to_lowercase())),
        other => Err(LoggingError::InvalidLevel(other.to_string())),
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the configured
/// level when set.
pub fn init_logging(config: &LoggingConfig) -> Result<LogHandle, LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| parse_level(&config.level))
        .map_err(|_| LoggingError::InvalidLevel(config.level.clone()))?;

    let (filter_layer, reload_handle) = reload::Layer::new(filter);
    let registry = tracing_subscriber::registry().with(filter_layer);

    let result = if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|_| LoggingError::AlreadyInitialized)?;
    Ok(LogHandle {
        reload: reload_handle,
    })
}
