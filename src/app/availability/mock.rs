//! Deterministic mock availability checker
//!
//! Used when no object store is configured. Presence is a pure function of
//! the resource id; only the reported size is random.

use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use tracing::debug;

use super::config::MockConfig;
use super::{AvailabilityChecker, AvailabilityStats};
use crate::app::models::{storage_key, AvailabilityResult, ResourceId};

/// Presence policy: an id is present when it is divisible by `modulus`
pub fn modulus_presence(id: ResourceId, modulus: i64) -> bool {
    modulus > 0 && id.get().rem_euclid(modulus) == 0
}

/// Mock checker backed by [`modulus_presence`]
#[derive(Debug)]
pub struct MockAvailabilityChecker {
    config: MockConfig,
    stats: Arc<AvailabilityStats>,
}

impl MockAvailabilityChecker {
    pub fn new(config: MockConfig, stats: Arc<AvailabilityStats>) -> Self {
        Self { config, stats }
    }

    fn random_size(&self) -> u64 {
        let (low, high) = if self.config.min_size <= self.config.max_size {
            (self.config.min_size, self.config.max_size)
        } else {
            (self.config.max_size, self.config.min_size)
        };
        rand::thread_rng().gen_range(low..=high)
    }
}

#[async_trait]
impl AvailabilityChecker for MockAvailabilityChecker {
    async fn check(&self, id: ResourceId) -> AvailabilityResult {
        if modulus_presence(id, self.config.modulus) {
            let size = self.random_size();
            debug!("Mock store reports {} present ({} bytes)", id, size);
            self.stats.record_found();
            AvailabilityResult::found(storage_key(id), size)
        } else {
            debug!("Mock store reports {} absent", id);
            self.stats.record_not_found();
            AvailabilityResult::not_found()
        }
    }

    fn mode(&self) -> &'static str {
        "mock"
    }
}
