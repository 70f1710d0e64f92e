//! Configuration loading with hierarchical merging.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid pool max_size: {0}. Must be between 1 and 1000")]
    InvalidPoolSize(usize),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Queue default timeout {0}ms exceeds the {1}ms ceiling")]
    QueueTimeoutTooLarge(u64, u64),

    #[error("Recovery interval cannot be zero")]
    ZeroRecoveryInterval,
}

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .meetbot/config.yaml (project config)
    /// 3. .meetbot/local.yaml (local overrides, optional)
    /// 4. Environment variables (MEETBOT_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".meetbot/config.yaml"))
            .merge(Yaml::file(".meetbot/local.yaml"))
            .merge(Env::prefixed("MEETBOT_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.pool.max_size == 0 || config.pool.max_size > 1_000 {
            return Err(ConfigError::InvalidPoolSize(config.pool.max_size));
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let ceiling = crate::domain::models::MAX_QUEUE_TIMEOUT_MS;
        if config.queue.default_timeout_ms > ceiling {
            return Err(ConfigError::QueueTimeoutTooLarge(
                config.queue.default_timeout_ms,
                ceiling,
            ));
        }

        if config.recovery.interval_secs == 0 {
            return Err(ConfigError::ZeroRecoveryInterval);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let config = Config::default();
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn bad_log_level_is_rejected() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn oversized_queue_timeout_is_rejected() {
        let mut config = Config::default();
        config.queue.default_timeout_ms = 900_000;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::QueueTimeoutTooLarge(_, _))
        ));
    }

    #[test]
    fn zero_pool_is_rejected() {
        let mut config = Config::default();
        config.pool.max_size = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidPoolSize(0))
        ));
    }
}
