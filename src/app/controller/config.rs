//! Client resilience configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::client;
use crate::errors::{ConfigError, ConfigResult};

/// Timing and retry budget for the resilience controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Hard client-side timeout for a direct start call
    pub abort_timeout: Duration,
    /// Interval between availability checks while polling
    pub poll_interval: Duration,
    /// Availability checks before polling gives up
    pub max_poll_attempts: u32,
    /// Manual retries allowed per item
    pub max_attempts: u32,
    /// Capacity of the item event channel
    pub event_buffer_size: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            abort_timeout: client::ABORT_TIMEOUT,
            poll_interval: client::POLL_INTERVAL,
            max_poll_attempts: client::MAX_POLL_ATTEMPTS,
            max_attempts: client::MAX_ATTEMPTS,
            event_buffer_size: client::EVENT_BUFFER_SIZE,
        }
    }
}

impl ControllerConfig {
    /// Longest time a polling phase can last
    pub fn polling_ceiling(&self) -> Duration {
        self.poll_interval * self.max_poll_attempts
    }

    /// Validate configuration values and return errors for invalid settings
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if self.abort_timeout.is_zero() {
            errors.push("client.abort_timeout must be greater than zero".to_string());
        }
        if self.poll_interval.is_zero() {
            errors.push("client.poll_interval must be greater than zero".to_string());
        }
        if self.max_poll_attempts == 0 {
            errors.push("client.max_poll_attempts must be greater than zero".to_string());
        }
        if self.event_buffer_size == 0 {
            errors.push("client.event_buffer_size must be greater than zero".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationFailed { errors })
        }
    }
}

/// Builder for ControllerConfig
#[derive(Debug, Default)]
pub struct ControllerConfigBuilder {
    config: ControllerConfig,
}

impl ControllerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort_timeout(mut self, timeout: Duration) -> Self {
        self.config.abort_timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn max_poll_attempts(mut self, attempts: u32) -> Self {
        self.config.max_poll_attempts = attempts;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.config.event_buffer_size = size;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> ConfigResult<ControllerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
