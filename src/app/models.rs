//! Data models shared by the server-side orchestrator and the client controller
//!
//! All payload types serialize in camelCase so they match the wire shapes
//! consumed by dashboards and HTTP clients.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{resources, storage};
use crate::errors::{ValidationError, ValidationResult};

/// Numeric identifier of a requested artifact
///
/// A bare `ResourceId` is not range-checked; use [`ResourceIdBounds::validate`]
/// at the boundary where ids enter the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(i64);

impl ResourceId {
    /// Wrap a raw id without validation
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Raw numeric value
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ResourceId> for i64 {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

impl FromStr for ResourceId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| ValidationError::InvalidResourceId {
                input: s.to_string(),
            })
    }
}

/// Inclusive range of accepted resource ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceIdBounds {
    pub min: i64,
    pub max: i64,
}

impl Default for ResourceIdBounds {
    fn default() -> Self {
        Self {
            min: resources::MIN_RESOURCE_ID,
            max: resources::MAX_RESOURCE_ID,
        }
    }
}

impl ResourceIdBounds {
    /// Check that `raw` lies inside the bounds
    pub fn validate(&self, raw: i64) -> ValidationResult<ResourceId> {
        if raw < self.min || raw > self.max {
            return Err(ValidationError::ResourceIdOutOfRange {
                id: raw,
                min: self.min,
                max: self.max,
            });
        }
        Ok(ResourceId(raw))
    }

    /// Whether the bounds form a non-empty range
    pub fn is_well_formed(&self) -> bool {
        self.min <= self.max
    }
}

/// Derive the object store key for a resource id
///
/// The id is always reduced to its absolute value before formatting, even
/// though ids are range-checked upstream, so the key can only ever contain
/// the prefix, decimal digits and the suffix.
pub fn storage_key(id: ResourceId) -> String {
    let sanitized = id.get().unsigned_abs();
    format!("{}{}{}", storage::KEY_PREFIX, sanitized, storage::KEY_SUFFIX)
}

/// Result of a single existence check
///
/// `key` and `size` are present if and only if `available` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResult {
    pub available: bool,
    pub key: Option<String>,
    pub size: Option<u64>,
}

impl AvailabilityResult {
    /// Object exists under `key` with `size` bytes
    pub fn found(key: impl Into<String>, size: u64) -> Self {
        Self {
            available: true,
            key: Some(key.into()),
            size: Some(size),
        }
    }

    /// Object does not exist (or could not be confirmed)
    pub fn not_found() -> Self {
        Self {
            available: false,
            key: None,
            size: None,
        }
    }
}

/// Terminal verdict of a start operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartStatus {
    Completed,
    Failed,
}

impl fmt::Display for StartStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartStatus::Completed => write!(f, "completed"),
            StartStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of a start operation, never mutated after creation
///
/// Fields are private so the completed/failed invariant on
/// `download_reference` and `size` cannot be broken after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResult {
    resource_id: ResourceId,
    status: StartStatus,
    download_reference: Option<String>,
    size: Option<u64>,
    processing_time_ms: u64,
    message: String,
}

impl StartResult {
    /// Successful start: the object is ready
    pub fn completed(
        resource_id: ResourceId,
        download_reference: String,
        size: u64,
        processing_time_ms: u64,
    ) -> Self {
        Self {
            resource_id,
            status: StartStatus::Completed,
            download_reference: Some(download_reference),
            size: Some(size),
            processing_time_ms,
            message: format!("Download ready after {:.1}s", seconds(processing_time_ms)),
        }
    }

    /// Unsuccessful start: the object was not found
    pub fn failed(resource_id: ResourceId, processing_time_ms: u64) -> Self {
        Self {
            resource_id,
            status: StartStatus::Failed,
            download_reference: None,
            size: None,
            processing_time_ms,
            message: format!(
                "File not available after {:.1}s of processing",
                seconds(processing_time_ms)
            ),
        }
    }

    pub fn resource_id(&self) -> ResourceId {
        self.resource_id
    }

    pub fn status(&self) -> StartStatus {
        self.status
    }

    pub fn is_completed(&self) -> bool {
        self.status == StartStatus::Completed
    }

    pub fn download_reference(&self) -> Option<&str> {
        self.download_reference.as_deref()
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn processing_time_ms(&self) -> u64 {
        self.processing_time_ms
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

fn seconds(ms: u64) -> f64 {
    ms as f64 / 1000.0
}

/// Opaque correlation token issued by initiate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a fresh random job id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Acknowledgement returned by initiate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateReceipt {
    pub job_id: JobId,
    pub count: usize,
    pub accepted_at: DateTime<Utc>,
}
