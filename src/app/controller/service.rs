//! Server operations as seen by the resilience controller
//!
//! The controller only needs `start` and `check`. Any error returned here is
//! treated as a transport failure and recovered by polling.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::app::models::{AvailabilityResult, ResourceId, StartResult};
use crate::app::orchestrator::DownloadOrchestrator;
use crate::errors::OrchestratorResult;

/// Download operations consumed by the controller
#[async_trait]
pub trait DownloadService: Send + Sync {
    /// Direct start attempt; `cancel` fires when the caller abandons it
    async fn start(
        &self,
        resource_id: ResourceId,
        cancel: CancellationToken,
    ) -> OrchestratorResult<StartResult>;

    /// Lightweight availability probe
    async fn check(&self, resource_id: ResourceId) -> OrchestratorResult<AvailabilityResult>;
}

/// In-process transport: call the orchestrator directly
#[async_trait]
impl DownloadService for DownloadOrchestrator {
    async fn start(
        &self,
        resource_id: ResourceId,
        cancel: CancellationToken,
    ) -> OrchestratorResult<StartResult> {
        DownloadOrchestrator::start(self, resource_id.get(), cancel).await
    }

    async fn check(&self, resource_id: ResourceId) -> OrchestratorResult<AvailabilityResult> {
        DownloadOrchestrator::check(self, resource_id.get(), false).await
    }
}
