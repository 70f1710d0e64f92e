//! Logging infrastructure.

pub mod logger;

pub use logger::{init_logging, LogHandle, LoggingError};
