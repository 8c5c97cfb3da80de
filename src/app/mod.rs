//! Core application logic for delayed-fetch
//!
//! This module holds the server-side pieces (availability checking, the delay
//! simulator and the download orchestrator) and the client-side resilience
//! controller that drives them.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use delayed_fetch::app::{
//!     build_checker, AvailabilityStats, ControllerConfig, DownloadOrchestrator,
//!     OrchestratorConfig, ResilienceController, ResourceId, StoreConfig,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let checker = build_checker(&StoreConfig::mock(), Arc::new(AvailabilityStats::default()))?;
//! let orchestrator = Arc::new(DownloadOrchestrator::new(OrchestratorConfig::default(), checker)?);
//! let controller = ResilienceController::new(orchestrator, ControllerConfig::default())?;
//!
//! for raw in [70000, 70001] {
//!     controller.start(ResourceId::new(raw))?;
//! }
//! for item in controller.items() {
//!     if let Some(done) = controller.await_terminal(item.resource_id).await {
//!         println!("{}: {}", done.resource_id, done.state);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod availability;
pub mod controller;
pub mod delay;
pub mod models;
pub mod orchestrator;

// Re-export main public API
pub use availability::{
    build_checker, AvailabilityChecker, AvailabilityStats, AvailabilityStatsSnapshot,
    HttpObjectStore, MockAvailabilityChecker, ObjectStore, StorageAvailabilityChecker,
    StoreConfig,
};
pub use controller::{
    ClientItem, ControllerConfig, ControllerConfigBuilder, DownloadService, ItemEvent, ItemState,
    ResilienceController,
};
pub use delay::{DelayConfig, DelaySimulator};
pub use models::{
    storage_key, AvailabilityResult, InitiateReceipt, JobId, ResourceId, ResourceIdBounds,
    StartResult, StartStatus,
};
pub use orchestrator::{
    ActiveGauge, DownloadOrchestrator, OrchestratorConfig, OrchestratorConfigBuilder,
    OrchestratorStatsSnapshot, RequestLimiter,
};
