//! Configuration management for Tollbooth.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ratelimit::RateLimitPolicy;

/// Main configuration for the Tollbooth components.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TollboothConfig {
    /// Counter store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Default rate limiting policy
    #[serde(default)]
    pub rate_limiting: RateLimitPolicy,

    /// Response cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Event bus configuration
    #[serde(default)]
    pub events: EventConfig,
}

/// Counter store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store connection URL. Absent means unconfigured: components are
    /// built detached and every feature degrades to pass-through.
    pub url: Option<String>,
}

/// Response cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Default TTL for cache entries, in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub default_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_cache_ttl_secs() -> u64 {
    300
}

impl CacheConfig {
    /// The default TTL as a `Duration`.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}

/// Event bus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    /// Channels the process-wide listener subscribes to at startup.
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            channels: default_channels(),
        }
    }
}

fn default_channels() -> Vec<String> {
    vec![
        "events".to_string(),
        "notifications".to_string(),
        "cache_events".to_string(),
    ]
}

impl TollboothConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &str) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> crate::error::Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| crate::error::TollboothError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ExpiryPolicy;

    #[test]
    fn test_defaults() {
        let config = TollboothConfig::default();
        assert!(config.store.url.is_none());
        assert_eq!(config.rate_limiting.requests_limit, 100);
        assert_eq!(config.cache.default_ttl_secs, 300);
        assert_eq!(
            config.events.channels,
            vec!["events", "notifications", "cache_events"]
        );
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
store:
  url: redis://localhost:6379/0
rate_limiting:
  requests_limit: 5
  window_secs: 60
  key_prefix: demo
  expiry: fixed_window
cache:
  default_ttl_secs: 60
events:
  channels:
    - events
"#;
        let config = TollboothConfig::from_yaml(yaml).unwrap();
        assert_eq!(
            config.store.url.as_deref(),
            Some("redis://localhost:6379/0")
        );
        assert_eq!(config.rate_limiting.requests_limit, 5);
        assert_eq!(config.rate_limiting.key_prefix, "demo");
        assert_eq!(config.rate_limiting.expiry, ExpiryPolicy::FixedWindow);
        assert_eq!(config.cache.default_ttl(), Duration::from_secs(60));
        assert_eq!(config.events.channels, vec!["events"]);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config = TollboothConfig::from_yaml("cache:\n  default_ttl_secs: 30\n").unwrap();
        assert_eq!(config.cache.default_ttl_secs, 30);
        assert_eq!(config.rate_limiting.window_secs, 60);
        assert!(config.store.url.is_none());
    }

    #[test]
    fn test_invalid_yaml_is_a_config_error() {
        let result = TollboothConfig::from_yaml("cache: [not, a, map]");
        assert!(result.is_err());
    }
}
