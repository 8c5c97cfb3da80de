//! Object-store backed availability checking
//!
//! The store is reached through the narrow [`ObjectStore`] capability: a
//! metadata-only existence probe. [`HttpObjectStore`] implements it with an
//! HTTP `HEAD` request against `<base_url>/<key>`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use url::Url;

use super::{AvailabilityChecker, AvailabilityStats};
use crate::app::models::{storage_key, AvailabilityResult, ResourceId};
use crate::constants::storage;
use crate::errors::{StoreError, StoreResult};

/// Existence probe against an object store
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    /// Probe `key`: `Some(size)` if the object exists, `None` if it does not
    async fn head(&self, key: &str) -> StoreResult<Option<u64>>;
}

/// Object store reached over plain HTTP
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    client: Client,
    base_url: Url,
}

impl HttpObjectStore {
    /// Create a store client rooted at `base_url`
    pub fn new(
        base_url: Url,
        probe_timeout: Duration,
        connect_timeout: Duration,
    ) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(probe_timeout)
            .connect_timeout(connect_timeout)
            .user_agent(storage::USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: with_trailing_slash(base_url),
        })
    }

    /// Full URL of the object stored under `key`
    pub fn object_url(&self, key: &str) -> StoreResult<Url> {
        self.base_url
            .join(key)
            .map_err(|e| StoreError::InvalidUrl {
                key: key.to_string(),
                error: e.to_string(),
            })
    }
}

// Url::join replaces the last path segment unless the base ends with '/'
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn head(&self, key: &str) -> StoreResult<Option<u64>> {
        let url = self.object_url(key)?;
        let response = self.client.head(url.as_str()).send().await?;
        let status = response.status();

        if status.is_success() {
            // HEAD responses carry no body, so read the header rather than the body size hint
            let size = response
                .headers()
                .get(CONTENT_LENGTH)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(0);
            return Ok(Some(size));
        }

        match status {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StoreError::AccessDenied {
                key: key.to_string(),
                status: status.as_u16(),
            }),
            _ => Err(StoreError::UnexpectedStatus {
                key: key.to_string(),
                status: status.as_u16(),
            }),
        }
    }
}

/// Availability checker over an [`ObjectStore`]
///
/// Store errors are reported as `available = false`. They are logged at warn
/// level and counted as degraded so they stay distinguishable from a true
/// absence.
#[derive(Debug)]
pub struct StorageAvailabilityChecker<S> {
    store: S,
    stats: Arc<AvailabilityStats>,
}

impl<S: ObjectStore> StorageAvailabilityChecker<S> {
    pub fn new(store: S, stats: Arc<AvailabilityStats>) -> Self {
        Self { store, stats }
    }
}

#[async_trait]
impl<S: ObjectStore> AvailabilityChecker for StorageAvailabilityChecker<S> {
    async fn check(&self, id: ResourceId) -> AvailabilityResult {
        let key = storage_key(id);

        match self.store.head(&key).await {
            Ok(Some(size)) => {
                debug!("Object {} present ({} bytes)", key, size);
                self.stats.record_found();
                AvailabilityResult::found(key, size)
            }
            Ok(None) => {
                debug!("Object {} not found", key);
                self.stats.record_not_found();
                AvailabilityResult::not_found()
            }
            Err(e) => {
                warn!(
                    resource_id = id.get(),
                    key = %key,
                    error = %e,
                    "Existence probe failed; reporting unavailable (degraded result)"
                );
                self.stats.record_degraded();
                AvailabilityResult::not_found()
            }
        }
    }

    fn mode(&self) -> &'static str {
        "backed"
    }
}
