use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::app_config::RedisSettings;

/// Redis connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub redis_url: String,
    pub connection_timeout: Duration,
    pub command_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl RedisConfig {
    pub fn from_settings(settings: &RedisSettings) -> Self {
        Self {
            redis_url: settings.url.clone(),
            connection_timeout: Duration::from_secs(settings.connection_timeout),
            command_timeout: Duration::from_secs(settings.command_timeout),
            retry_attempts: settings.retry_attempts,
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.redis_url.is_empty() {
            return Err("Redis URL cannot be empty".to_string());
        }
        if self.connection_timeout.as_secs() == 0 {
            return Err("Connection timeout must be greater than 0".to_string());
        }
        if self.command_timeout.as_secs() == 0 {
            return Err("Command timeout must be greater than 0".to_string());
        }
        if self.retry_attempts == 0 {
            return Err("Retry attempts must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(url: &str) -> RedisSettings {
        RedisSettings {
            url: url.to_string(),
            connection_timeout: 5,
            command_timeout: 5,
            retry_attempts: 3,
            retry_delay_ms: 100,
            guest_state_ttl_secs: 60,
        }
    }

    #[test]
    fn test_from_settings_converts_durations() {
        let config = RedisConfig::from_settings(&settings("redis://localhost:6379"));
        assert_eq!(config.retry_delay, Duration::from_millis(100));
        assert_eq!(config.command_timeout, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_url_is_invalid() {
        let config = RedisConfig::from_settings(&settings(""));
        assert!(config.validate().is_err());
    }
}
