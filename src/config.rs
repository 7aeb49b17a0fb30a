//! Configuration Module
//!
//! Loads query cache and demo settings from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Seconds an unobserved entry is kept before garbage collection
    pub gc_time: u64,
    /// Garbage-collection sweep interval in seconds
    pub cleanup_interval: u64,
    /// Soft cap on cached entries
    pub max_entries: usize,
    /// Freshness window in milliseconds for the demo queries
    pub stale_after_ms: u64,
    /// Base URL of the posts API the demo fetches from
    pub api_base_url: String,
    /// Post fetched by the single-post demo query
    pub post_id: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `GC_TIME` - Grace period in seconds (default: 300)
    /// - `CLEANUP_INTERVAL` - Sweep frequency in seconds (default: 1)
    /// - `MAX_ENTRIES` - Soft entry cap (default: 1000)
    /// - `STALE_AFTER_MS` - Demo freshness window (default: 0)
    /// - `API_BASE_URL` - Posts API (default: https://jsonplaceholder.typicode.com)
    /// - `POST_ID` - Demo post id (default: 1)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            gc_time: parse_var("GC_TIME").unwrap_or(defaults.gc_time),
            cleanup_interval: parse_var("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            max_entries: parse_var("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            stale_after_ms: parse_var("STALE_AFTER_MS").unwrap_or(defaults.stale_after_ms),
            api_base_url: env::var("API_BASE_URL").unwrap_or(defaults.api_base_url),
            post_id: parse_var("POST_ID").unwrap_or(defaults.post_id),
        }
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gc_time: 300,
            cleanup_interval: 1,
            max_entries: 1000,
            stale_after_ms: 0,
            api_base_url: "https://jsonplaceholder.typicode.com".to_string(),
            post_id: 1,
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.gc_time, 300);
        assert_eq!(config.cleanup_interval, 1);
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.stale_after(), Duration::ZERO);
        assert_eq!(config.api_base_url, "https://jsonplaceholder.typicode.com");
        assert_eq!(config.post_id, 1);
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        for name in [
            "GC_TIME",
            "CLEANUP_INTERVAL",
            "MAX_ENTRIES",
            "STALE_AFTER_MS",
            "API_BASE_URL",
            "POST_ID",
        ] {
            env::remove_var(name);
        }

        let config = Config::from_env();
        assert_eq!(config.gc_time, 300);
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.post_id, 1);
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        env::set_var("QUERY_CACHE_TEST_BAD_NUMBER", "not-a-number");
        assert_eq!(parse_var::<u64>("QUERY_CACHE_TEST_BAD_NUMBER"), None);
        env::remove_var("QUERY_CACHE_TEST_BAD_NUMBER");
    }
}
