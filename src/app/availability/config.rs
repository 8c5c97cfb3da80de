//! Availability checker configuration
//!
//! Selects between backed mode (an object store base URL is configured) and
//! mock mode (no store), and carries the settings for each.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{mock, storage};
use crate::errors::{ConfigError, ConfigResult};

/// Configuration for the availability checker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Object store base URL; `None` selects mock mode
    pub base_url: Option<Url>,
    /// Timeout for a single existence probe
    pub probe_timeout: Duration,
    /// Connect timeout for existence probes
    pub connect_timeout: Duration,
    /// Mock mode settings
    pub mock: MockConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            probe_timeout: storage::PROBE_TIMEOUT,
            connect_timeout: storage::CONNECT_TIMEOUT,
            mock: MockConfig::default(),
        }
    }
}

/// Settings for the deterministic mock checker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockConfig {
    /// Ids divisible by this value are present
    pub modulus: i64,
    /// Smallest generated size in bytes
    pub min_size: u64,
    /// Largest generated size in bytes
    pub max_size: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            modulus: mock::AVAILABILITY_MODULUS,
            min_size: mock::MIN_SIZE_BYTES,
            max_size: mock::MAX_SIZE_BYTES,
        }
    }
}

impl StoreConfig {
    /// Mock mode with default settings
    pub fn mock() -> Self {
        Self::default()
    }

    /// Backed mode against `base_url`
    pub fn backed(base_url: Url) -> Self {
        Self {
            base_url: Some(base_url),
            ..Self::default()
        }
    }

    /// Whether a real object store is configured
    pub fn is_backed(&self) -> bool {
        self.base_url.is_some()
    }

    /// Validate configuration values
    pub fn validate(&self) -> ConfigResult<()> {
        if self.mock.modulus <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "mock.modulus".to_string(),
                value: self.mock.modulus.to_string(),
                reason: "Modulus must be positive".to_string(),
            });
        }

        if self.mock.min_size > self.mock.max_size {
            return Err(ConfigError::InvalidValue {
                field: "mock.min_size".to_string(),
                value: self.mock.min_size.to_string(),
                reason: format!("Must not exceed mock.max_size ({})", self.mock.max_size),
            });
        }

        if self.probe_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "store.probe_timeout".to_string(),
                value: "0s".to_string(),
                reason: "Probe timeout must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
