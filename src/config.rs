//! Configuration management for delayed-fetch
//!
//! This module provides unified configuration management with multi-source
//! loading and zero-config defaults. Precedence, lowest first:
//!
//! 1. Built-in defaults
//! 2. Config file (explicit path, `./delayed-fetch.toml`, user config dir)
//! 3. `DELAYED_FETCH_*` environment variables

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::app::{ControllerConfig, DelayConfig, OrchestratorConfig, ResourceIdBounds, StoreConfig};
use crate::app::availability::MockConfig;
use crate::constants::{client, config as files, delay, env, limits, logging, mock, resources, storage};
use crate::errors::{AppError, ConfigError, ConfigResult, Result};

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Simulated processing delay
    pub delay: DelayConfigToml,
    /// Accepted resource ids and batch size
    pub resources: ResourcesConfigToml,
    /// Server-side request limiting
    pub server: ServerConfigToml,
    /// Object store used for availability checks
    pub store: StoreConfigToml,
    /// Mock availability policy (used when no store URL is set)
    pub mock: MockConfigToml,
    /// Client resilience timing
    pub client: ClientConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly delay configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayConfigToml {
    /// Disable to make every start return immediately
    pub enabled: bool,
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for DelayConfigToml {
    fn default() -> Self {
        Self {
            enabled: delay::DEFAULT_ENABLED,
            min_ms: delay::DEFAULT_MIN_MS,
            max_ms: delay::DEFAULT_MAX_MS,
        }
    }
}

/// TOML-friendly resource id bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourcesConfigToml {
    pub min_id: i64,
    pub max_id: i64,
    /// Maximum ids per initiate call
    pub max_batch_size: usize,
}

impl Default for ResourcesConfigToml {
    fn default() -> Self {
        Self {
            min_id: resources::MIN_RESOURCE_ID,
            max_id: resources::MAX_RESOURCE_ID,
            max_batch_size: resources::MAX_BATCH_SIZE,
        }
    }
}

/// TOML-friendly server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfigToml {
    /// Requests per second across all operations (0 = unlimited)
    pub rate_limit_rps: u32,
}

impl Default for ServerConfigToml {
    fn default() -> Self {
        Self {
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
        }
    }
}

/// TOML-friendly object store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfigToml {
    /// Base URL of the object store; unset = mock mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<Url>,
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for StoreConfigToml {
    fn default() -> Self {
        Self {
            base_url: None,
            probe_timeout: storage::PROBE_TIMEOUT,
            connect_timeout: storage::CONNECT_TIMEOUT,
        }
    }
}

/// TOML-friendly mock availability configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockConfigToml {
    /// Ids divisible by this value are present
    pub modulus: i64,
    pub min_size: u64,
    pub max_size: u64,
}

impl Default for MockConfigToml {
    fn default() -> Self {
        Self {
            modulus: mock::AVAILABILITY_MODULUS,
            min_size: mock::MIN_SIZE_BYTES,
            max_size: mock::MAX_SIZE_BYTES,
        }
    }
}

/// TOML-friendly client resilience configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigToml {
    /// Hard timeout for a direct start call
    #[serde(with = "humantime_serde")]
    pub abort_timeout: Duration,
    /// Interval between availability checks
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    /// Manual retries per item
    pub max_attempts: u32,
    pub event_buffer_size: usize,
}

impl Default for ClientConfigToml {
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

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Convert TOML-friendly configuration to runtime configuration
    pub fn to_runtime_config(&self) -> (OrchestratorConfig, StoreConfig, ControllerConfig) {
        (
            self.orchestrator_config(),
            self.store_config(),
            self.controller_config(),
        )
    }

    fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            bounds: ResourceIdBounds {
                min: self.resources.min_id,
                max: self.resources.max_id,
            },
            max_batch_size: self.resources.max_batch_size,
            rate_limit_rps: match self.server.rate_limit_rps {
                0 => None,
                rps => Some(rps),
            },
            delay: DelayConfig {
                enabled: self.delay.enabled,
                min_ms: self.delay.min_ms,
                max_ms: self.delay.max_ms,
            },
        }
    }

    fn store_config(&self) -> StoreConfig {
        StoreConfig {
            base_url: self.store.base_url.clone(),
            probe_timeout: self.store.probe_timeout,
            connect_timeout: self.store.connect_timeout,
            mock: MockConfig {
                modulus: self.mock.modulus,
                min_size: self.mock.min_size,
                max_size: self.mock.max_size,
            },
        }
    }

    fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            abort_timeout: self.client.abort_timeout,
            poll_interval: self.client.poll_interval,
            max_poll_attempts: self.client.max_poll_attempts,
            max_attempts: self.client.max_attempts,
            event_buffer_size: self.client.event_buffer_size,
        }
    }

    /// Validate every section, collecting all problems
    pub fn validate(&self) -> ConfigResult<()> {
        let (orchestrator, store, controller) = self.to_runtime_config();
        let mut errors = Vec::new();

        for result in [orchestrator.validate(), store.validate(), controller.validate()] {
            match result {
                Ok(()) => {}
                Err(ConfigError::ValidationFailed { errors: nested }) => errors.extend(nested),
                Err(e) => errors.push(e.to_string()),
            }
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "logging.level must be one of {:?}, got '{}'",
                LOG_LEVELS, self.logging.level
            ));
        }

        // The abort timeout should cover the slowest legitimate start
        if self.delay.enabled
            && Duration::from_millis(self.delay.max_ms) > self.client.abort_timeout
        {
            debug!(
                "client.abort_timeout ({:?}) is shorter than delay.max_ms ({}ms); slow starts will fall back to polling",
                self.client.abort_timeout, self.delay.max_ms
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationFailed { errors })
        }
    }

    /// Load configuration with multi-source precedence
    pub async fn load(config_file_override: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::default();

        let config_path = match config_file_override {
            Some(ref path) => Some(path.clone()),
            None => Self::find_config_file(),
        };

        if let Some(path) = config_path {
            if path.exists() {
                debug!("Loading config from: {}", path.display());
                config = Self::load_from_file(&path).await?;
            } else if config_file_override.is_some() {
                return Err(ConfigError::NotFound { path }.into());
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DELAYED_FETCH_*` environment variables
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        if let Some(value) = lookup(env::STORE_URL) {
            let value = value.trim();
            self.store.base_url = if value.is_empty() {
                None
            } else {
                Some(Url::parse(value).map_err(|e| invalid(env::STORE_URL, value, e))?)
            };
        }
        if let Some(value) = lookup(env::DELAY_ENABLED) {
            self.delay.enabled = parse_env(env::DELAY_ENABLED, &value)?;
        }
        if let Some(value) = lookup(env::DELAY_MIN_MS) {
            self.delay.min_ms = parse_env(env::DELAY_MIN_MS, &value)?;
        }
        if let Some(value) = lookup(env::DELAY_MAX_MS) {
            self.delay.max_ms = parse_env(env::DELAY_MAX_MS, &value)?;
        }
        if let Some(value) = lookup(env::RATE_LIMIT_RPS) {
            self.server.rate_limit_rps = parse_env(env::RATE_LIMIT_RPS, &value)?;
        }
        if let Some(value) = lookup(env::LOG_LEVEL) {
            self.logging.level = value.trim().to_lowercase();
        }
        Ok(())
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(".").join(files::LOCAL_FILE_NAME)];
        if let Some(user) = Self::default_config_path() {
            search_paths.push(user);
        }

        let found = search_paths.into_iter().find(|path| path.exists());
        match &found {
            Some(path) => debug!("Found config file: {}", path.display()),
            None => debug!("No config file found in standard locations"),
        }
        found
    }

    /// Default config file path for the current user
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(files::APP_DIR_NAME).join(files::USER_FILE_NAME))
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::generic(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: AppConfig = toml::from_str(&content).map_err(ConfigError::from)?;
        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Default configuration file content with a short header
    pub fn generate_default_config_content() -> ConfigResult<String> {
        let body = Self::default().to_toml()?;
        Ok(format!(
            "# delayed-fetch configuration\n\
             # Durations use humantime syntax, e.g. \"5s\" or \"3m 10s\".\n\
             # Set store.base_url to probe a real object store instead of the mock.\n\
             # Environment variables DELAYED_FETCH_* override values in this file.\n\n{}",
            body
        ))
    }

    /// Write the default configuration to `path` (or the user config path)
    pub async fn write_default(path: Option<PathBuf>, force: bool) -> Result<PathBuf> {
        let path = match path {
            Some(path) => path,
            None => Self::default_config_path()
                .ok_or_else(|| AppError::generic("Could not determine user config directory"))?,
        };

        if path.exists() && !force {
            return Err(AppError::generic(format!(
                "Config file already exists: {} (use --force to overwrite)",
                path.display()
            )));
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        tokio::fs::write(&path, Self::generate_default_config_content()?).await?;
        info!("Wrote default configuration to {}", path.display());
        Ok(path)
    }
}

fn parse_env<T>(name: &str, value: &str) -> ConfigResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| invalid(name, value, e))
}

fn invalid(name: &str, value: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidValue {
        field: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
