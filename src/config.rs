//! Configuration Module
//!
//! Handles loading and managing cache and server configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::cache::{DEFAULT_SEGMENT_COUNT, DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL};
use crate::error::{CacheError, Result};

/// Cache and server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of independently locked segments
    pub segment_count: usize,
    /// Default TTL in seconds used by `set_default` / `add_default`
    pub default_ttl: u64,
    /// Janitor sweep interval in milliseconds
    pub cleanup_interval_ms: u64,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SEGMENT_COUNT` - Number of segments (default: 16)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 30)
    /// - `CLEANUP_INTERVAL_MS` - Janitor sweep interval in milliseconds (default: 1000)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            segment_count: parse_var("SEGMENT_COUNT").unwrap_or(defaults.segment_count),
            default_ttl: parse_var("DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            cleanup_interval_ms: parse_var("CLEANUP_INTERVAL_MS")
                .unwrap_or(defaults.cleanup_interval_ms),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
        }
    }

    /// Rejects values that cannot produce a working cache.
    pub fn validate(&self) -> Result<()> {
        if self.segment_count == 0 {
            return Err(CacheError::InvalidConfig(
                "segment count must be at least 1".to_string(),
            ));
        }
        if self.cleanup_interval_ms == 0 {
            return Err(CacheError::InvalidConfig(
                "cleanup interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            segment_count: DEFAULT_SEGMENT_COUNT,
            default_ttl: DEFAULT_TTL.as_secs(),
            cleanup_interval_ms: DEFAULT_SWEEP_INTERVAL.as_millis() as u64,
            server_port: 3000,
        }
    }
}
