//! Error types for delayed_fetch
//!
//! This module defines the error types for all components of the application.
//! Negative availability results are deliberately absent from this taxonomy:
//! an object that is not found is a normal `AvailabilityResult`, not an error.

use std::path::PathBuf;
use thiserror::Error;

/// Input validation errors, rejected before any timing logic runs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Initiate called with no ids
    #[error("At least one resource id is required")]
    EmptyBatch,

    /// Initiate called with more ids than allowed
    #[error("Too many resource ids: {count} supplied, at most {max} allowed")]
    BatchTooLarge { count: usize, max: usize },

    /// Resource id outside the configured inclusive range
    #[error("Resource id {id} is out of range [{min}, {max}]")]
    ResourceIdOutOfRange { id: i64, min: i64, max: i64 },

    /// Resource id could not be parsed
    #[error("Invalid resource id: {input}")]
    InvalidResourceId { input: String },
}

/// Object store probe errors
///
/// Probe errors never reach callers of the availability checker; they are
/// logged, counted as degraded results and reported as `available = false`.
/// Only building a checker from invalid settings fails outright.
#[derive(Error, Debug)]
pub enum StoreError {
    /// HTTP request failed (network, TLS, timeout)
    #[error("Object store request failed")]
    Http(#[from] reqwest::Error),

    /// Store refused access to the object
    #[error("Access denied for key {key} (HTTP {status})")]
    AccessDenied { key: String, status: u16 },

    /// Store answered with a status that is neither success nor not-found
    #[error("Unexpected object store response for key {key}: HTTP {status}")]
    UnexpectedStatus { key: String, status: u16 },

    /// Object URL could not be built from the base URL and key
    #[error("Invalid object URL for key {key}: {error}")]
    InvalidUrl { key: String, error: String },

    /// Checker settings rejected at build time
    #[error("Invalid availability checker settings: {0}")]
    Config(#[from] ConfigError),
}

/// Download orchestrator errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    /// Request failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Deliberately triggered fault for exercising error reporting end-to-end
    #[error("Test error triggered for resource id {resource_id}")]
    InjectedFault { resource_id: i64 },

    /// Request rate limit exhausted
    #[error("Too many requests, please try again later")]
    RateLimited,

    /// Caller abandoned the start operation before it finished
    #[error("Start for resource id {resource_id} was cancelled after {elapsed_ms}ms")]
    Cancelled { resource_id: i64, elapsed_ms: u64 },
}

/// Client resilience controller errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// Operation on an id that is not tracked
    #[error("Resource id {resource_id} is not tracked")]
    NotTracked { resource_id: i64 },

    /// Tracking an id twice
    #[error("Resource id {resource_id} is already tracked")]
    AlreadyTracked { resource_id: i64 },

    /// Operation not permitted from the item's current state
    #[error("Cannot {action} resource id {resource_id} while it is {state}")]
    InvalidTransition {
        resource_id: i64,
        action: &'static str,
        state: String,
    },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Failed to serialize configuration")]
    Serialize(#[from] toml::ser::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// Configuration validation failed
    #[error("Configuration validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<String> },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Validation error
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Orchestrator error
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    /// Controller error
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// Object store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// JSON output error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Orchestrator(OrchestratorError::RateLimited)
            | AppError::Orchestrator(OrchestratorError::Cancelled { .. })
            | AppError::Store(StoreError::Http(_)) => true,

            AppError::Validation(_)
            | AppError::Orchestrator(OrchestratorError::Validation(_))
            | AppError::Orchestrator(OrchestratorError::InjectedFault { .. })
            | AppError::Config(_) => false,

            _ => false,
        }
    }

    /// Get error category for logging and metrics
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::Orchestrator(OrchestratorError::Validation(_)) => "validation",
            AppError::Orchestrator(OrchestratorError::InjectedFault { .. }) => "fault_injection",
            AppError::Orchestrator(_) => "orchestrator",
            AppError::Controller(_) => "controller",
            AppError::Store(_) => "store",
            AppError::Config(_) => "config",
            AppError::Json(_) => "json",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Validation result type alias
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

/// Object store result type alias
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Orchestrator result type alias
pub type OrchestratorResult<T> = std::result::Result<T, OrchestratorError>;

/// Controller result type alias
pub type ControllerResult<T> = std::result::Result<T, ControllerError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
