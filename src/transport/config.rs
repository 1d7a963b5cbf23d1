//! Per-connection configuration.

use std::time::Duration;

use crate::core::{ConfigError, IDLE_SUSPEND_TIMEOUT, MAX_FRAME_LENGTH, WILL_RETRY_CONNECT_COUNT};

use super::backoff::BackoffConfig;

/// Configuration for a [`Connection`](super::Connection).
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    /// Reconnect pacing.
    pub backoff: BackoffConfig,
    /// Consecutive failed attempts tolerated before giving up.
    pub will_retry_connect_count: u32,
    /// Use abridged framing when the secret allows a choice.
    pub prefer_abridged: bool,
    /// Largest inbound frame accepted before declaring desync.
    pub max_frame_length: u32,
    /// Quiet period after which idle media/file connections are suspended.
    pub idle_suspend_timeout: Duration,
    /// Ask the datacenter for IPv6 addresses.
    pub prefer_ipv6: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            will_retry_connect_count: WILL_RETRY_CONNECT_COUNT,
            prefer_abridged: false,
            max_frame_length: MAX_FRAME_LENGTH,
            idle_suspend_timeout: IDLE_SUSPEND_TIMEOUT,
            prefer_ipv6: false,
        }
    }
}

impl ConnectionConfig {
    /// Start a builder from the defaults.
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::new()
    }

    /// Check the configuration for values the connection cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.backoff.validate()?;
        if self.will_retry_connect_count == 0 {
            return Err(ConfigError::Invalid {
                name: "will_retry_connect_count",
                reason: "must allow at least one attempt".into(),
            });
        }
        if self.max_frame_length < 4 {
            return Err(ConfigError::Invalid {
                name: "max_frame_length",
                reason: format!("{} cannot hold a single word", self.max_frame_length),
            });
        }
        Ok(())
    }
}

/// Builder for [`ConnectionConfig`].
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    /// Create a builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reconnect pacing.
    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.config.backoff = backoff;
        self
    }

    /// Set the number of failed attempts tolerated.
    pub fn will_retry_connect_count(mut self, count: u32) -> Self {
        self.config.will_retry_connect_count = count;
        self
    }

    /// Prefer abridged framing.
    pub fn prefer_abridged(mut self, enabled: bool) -> Self {
        self.config.prefer_abridged = enabled;
        self
    }

    /// Set the inbound frame size limit.
    pub fn max_frame_length(mut self, length: u32) -> Self {
        self.config.max_frame_length = length;
        self
    }

    /// Set the idle suspend timeout.
    pub fn idle_suspend_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_suspend_timeout = timeout;
        self
    }

    /// Prefer IPv6 addresses.
    pub fn prefer_ipv6(mut self, enabled: bool) -> Self {
        self.config.prefer_ipv6 = enabled;
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<ConnectionConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.will_retry_connect_count, 5);
        assert_eq!(config.max_frame_length, 2 * 1024 * 1024);
        assert_eq!(config.backoff.initial_delay_ms, 1000);
        assert!(!config.prefer_abridged);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ConnectionConfig::builder()
            .will_retry_connect_count(3)
            .prefer_abridged(true)
            .idle_suspend_timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        assert_eq!(config.will_retry_connect_count, 3);
        assert!(config.prefer_abridged);
        assert_eq!(config.idle_suspend_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_builder_rejects_invalid() {
        let err = ConnectionConfig::builder()
            .will_retry_connect_count(0)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "will_retry_connect_count",
                ..
            }
        ));

        assert!(ConnectionConfig::builder().max_frame_length(2).build().is_err());
    }
}
