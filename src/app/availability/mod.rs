//! Availability checking for requested resources
//!
//! Given a resource id, produce an existence verdict and, when the object is
//! present, its size. Absence is a normal result, never an error.
//!
//! # Operating modes
//!
//! - **Backed** ([`StorageAvailabilityChecker`]): probes a real object store.
//!   Store failures degrade to `available = false` and are counted separately
//!   in [`AvailabilityStats`].
//! - **Mock** ([`MockAvailabilityChecker`]): presence is decided by
//!   [`modulus_presence`], so the same id always gives the same verdict.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use delayed_fetch::app::availability::{build_checker, AvailabilityStats, StoreConfig};
//! use delayed_fetch::app::models::ResourceId;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let stats = Arc::new(AvailabilityStats::default());
//! let checker = build_checker(&StoreConfig::mock(), stats)?;
//! let result = checker.check(ResourceId::new(70000)).await;
//! assert!(result.available);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod mock;
pub mod store;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::app::models::{AvailabilityResult, ResourceId};
use crate::errors::StoreResult;

pub use config::{MockConfig, StoreConfig};
pub use mock::{modulus_presence, MockAvailabilityChecker};
pub use store::{HttpObjectStore, ObjectStore, StorageAvailabilityChecker};

/// Existence check for a single resource id
#[async_trait]
pub trait AvailabilityChecker: Send + Sync + std::fmt::Debug {
    /// Check whether the object for `id` exists; never fails
    async fn check(&self, id: ResourceId) -> AvailabilityResult;

    /// Short label of the operating mode, for logs
    fn mode(&self) -> &'static str;
}

/// Counters distinguishing true absence from degraded results
#[derive(Debug, Default)]
pub struct AvailabilityStats {
    found: AtomicU64,
    not_found: AtomicU64,
    degraded: AtomicU64,
}

/// Point-in-time copy of [`AvailabilityStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AvailabilityStatsSnapshot {
    pub found: u64,
    pub not_found: u64,
    pub degraded: u64,
}

impl AvailabilityStats {
    pub fn record_found(&self) {
        self.found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_not_found(&self) {
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    /// A store error reported as unavailable
    pub fn record_degraded(&self) {
        self.degraded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> AvailabilityStatsSnapshot {
        AvailabilityStatsSnapshot {
            found: self.found.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            degraded: self.degraded.load(Ordering::Relaxed),
        }
    }
}

/// Build the checker selected by `config`
pub fn build_checker(
    config: &StoreConfig,
    stats: Arc<AvailabilityStats>,
) -> StoreResult<Arc<dyn AvailabilityChecker>> {
    config.validate()?;

    match &config.base_url {
        Some(base_url) => {
            info!("Availability checks use object store at {}", base_url);
            let store = HttpObjectStore::new(
                base_url.clone(),
                config.probe_timeout,
                config.connect_timeout,
            )?;
            Ok(Arc::new(StorageAvailabilityChecker::new(store, stats)))
        }
        None => {
            info!(
                "No object store configured; using mock availability (id mod {} == 0)",
                config.mock.modulus
            );
            Ok(Arc::new(MockAvailabilityChecker::new(
                config.mock.clone(),
                stats,
            )))
        }
    }
}
