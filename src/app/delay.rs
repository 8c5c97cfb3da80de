//! Simulated processing delay
//!
//! Models the variable backend cost of a start operation with a latency drawn
//! uniformly from a configured window.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::delay;
use crate::errors::{ConfigError, ConfigResult};

/// Delay window configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayConfig {
    /// When false every draw is zero
    pub enabled: bool,
    /// Lower bound in milliseconds (inclusive)
    pub min_ms: u64,
    /// Upper bound in milliseconds (inclusive)
    pub max_ms: u64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            enabled: delay::DEFAULT_ENABLED,
            min_ms: delay::DEFAULT_MIN_MS,
            max_ms: delay::DEFAULT_MAX_MS,
        }
    }
}

impl DelayConfig {
    /// No delay at all
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Always exactly `ms` milliseconds
    pub fn fixed(ms: u64) -> Self {
        Self {
            enabled: true,
            min_ms: ms,
            max_ms: ms,
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.min_ms > self.max_ms {
            return Err(ConfigError::InvalidValue {
                field: "delay.min_ms".to_string(),
                value: self.min_ms.to_string(),
                reason: format!("Must not exceed delay.max_ms ({})", self.max_ms),
            });
        }
        Ok(())
    }
}

/// Draws processing delays from a [`DelayConfig`]
#[derive(Debug, Clone)]
pub struct DelaySimulator {
    config: DelayConfig,
}

impl DelaySimulator {
    pub fn new(config: DelayConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DelayConfig {
        &self.config
    }

    /// Next delay in milliseconds
    pub fn next_delay_ms(&self) -> u64 {
        if !self.config.enabled {
            return 0;
        }
        // Guard against an unvalidated inverted window rather than panicking in gen_range
        let (low, high) = if self.config.min_ms <= self.config.max_ms {
            (self.config.min_ms, self.config.max_ms)
        } else {
            (self.config.max_ms, self.config.min_ms)
        };
        rand::thread_rng().gen_range(low..=high)
    }

    /// Next delay as a [`Duration`]
    pub fn next_delay(&self) -> Duration {
        Duration::from_millis(self.next_delay_ms())
    }
}
