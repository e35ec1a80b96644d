//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Base URL of the prediction oracle; unset disables prediction
    pub oracle_url: Option<String>,

    /// Names per oracle batch request
    pub oracle_batch_size: usize,

    /// Oracle batches in flight at once
    pub oracle_max_concurrency: usize,

    pub oracle_timeout: Duration,

    /// Quiet period before a queued reprojection runs
    pub reproject_debounce: Duration,

    /// How often stale masks are retried
    pub stale_retry_interval: Duration,
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value.parse().map_err(|_| ConfigError::InvalidValue(key)),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", 10)?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = parse_or("PORT", 3000)?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let oracle_url = env::var("ORACLE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let oracle_batch_size: usize = parse_or("ORACLE_BATCH_SIZE", 25)?;
        if oracle_batch_size == 0 {
            return Err(ConfigError::InvalidValue("ORACLE_BATCH_SIZE"));
        }

        let oracle_max_concurrency: usize = parse_or("ORACLE_MAX_CONCURRENCY", 4)?;
        if oracle_max_concurrency == 0 {
            return Err(ConfigError::InvalidValue("ORACLE_MAX_CONCURRENCY"));
        }

        let oracle_timeout = Duration::from_secs(parse_or("ORACLE_TIMEOUT_SECS", 30)?);
        let reproject_debounce = Duration::from_millis(parse_or("REPROJECT_DEBOUNCE_MS", 250)?);
        let stale_retry_interval = Duration::from_secs(parse_or("STALE_RETRY_INTERVAL_SECS", 60)?);

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            oracle_url,
            oracle_batch_size,
            oracle_max_concurrency,
            oracle_timeout,
            reproject_debounce,
            stale_retry_interval,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_uses_default_when_unset() {
        let value: u64 = parse_or("MASK_CATALOG_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_or_rejects_garbage() {
        env::set_var("MASK_CATALOG_TEST_GARBAGE_VARIABLE", "not-a-number");
        let result: Result<u64, _> = parse_or("MASK_CATALOG_TEST_GARBAGE_VARIABLE", 1);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }
}
