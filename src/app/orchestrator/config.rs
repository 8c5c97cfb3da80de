//! Orchestrator configuration management

use serde::{Deserialize, Serialize};

use crate::app::delay::DelayConfig;
use crate::app::models::ResourceIdBounds;
use crate::constants::{limits, resources};
use crate::errors::{ConfigError, ConfigResult};

/// Configuration for the download orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Accepted resource id range
    pub bounds: ResourceIdBounds,
    /// Maximum ids per initiate call
    pub max_batch_size: usize,
    /// Request limit across all operations; `None` disables limiting
    pub rate_limit_rps: Option<u32>,
    /// Simulated processing delay
    pub delay: DelayConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            bounds: ResourceIdBounds::default(),
            max_batch_size: resources::MAX_BATCH_SIZE,
            rate_limit_rps: Some(limits::DEFAULT_RATE_LIMIT_RPS),
            delay: DelayConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Validate configuration values and return errors for invalid settings
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.bounds.is_well_formed() {
            return Err(ConfigError::InvalidValue {
                field: "resources.min_id".to_string(),
                value: self.bounds.min.to_string(),
                reason: format!("Must not exceed resources.max_id ({})", self.bounds.max),
            });
        }

        if self.max_batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "resources.max_batch_size".to_string(),
                value: "0".to_string(),
                reason: "Batch size must be greater than zero".to_string(),
            });
        }

        if self.rate_limit_rps == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "server.rate_limit_rps".to_string(),
                value: "0".to_string(),
                reason: "Use no limit instead of a zero rate".to_string(),
            });
        }

        self.delay.validate()
    }
}

/// Builder for OrchestratorConfig
#[derive(Debug, Default)]
pub struct OrchestratorConfigBuilder {
    config: OrchestratorConfig,
}

impl OrchestratorConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bounds(mut self, min: i64, max: i64) -> Self {
        self.config.bounds = ResourceIdBounds { min, max };
        self
    }

    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.config.max_batch_size = size;
        self
    }

    pub fn rate_limit_rps(mut self, rps: Option<u32>) -> Self {
        self.config.rate_limit_rps = rps;
        self
    }

    pub fn delay(mut self, delay: DelayConfig) -> Self {
        self.config.delay = delay;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> ConfigResult<OrchestratorConfig> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Build without validation (for testing)
    pub fn build_unchecked(self) -> OrchestratorConfig {
        self.config
    }
}
