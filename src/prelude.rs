//! Prelude module for the delayed-fetch library
//!
//! Re-exports the items most integrations need, so a single
//! `use delayed_fetch::prelude::*;` is enough to wire an orchestrator and a
//! resilient client together.
//!
//! # Usage
//!
//! ```rust,no_run
//! use delayed_fetch::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let checker = build_checker(&StoreConfig::mock(), Arc::new(AvailabilityStats::default()))?;
//!     let orchestrator = Arc::new(DownloadOrchestrator::new(OrchestratorConfig::default(), checker)?);
//!     let controller = ResilienceController::new(orchestrator, ControllerConfig::default())?;
//!
//!     controller.start(ResourceId::new(70000))?;
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Server side
pub use crate::app::{
    build_checker, AvailabilityChecker, AvailabilityResult, AvailabilityStats, DelayConfig,
    DownloadOrchestrator, OrchestratorConfig, ResourceId, StartResult, StartStatus, StoreConfig,
};

// Client side
pub use crate::app::{
    ClientItem, ControllerConfig, DownloadService, ItemEvent, ItemState, ResilienceController,
};

// Configuration
pub use crate::config::AppConfig;

// Cancellation handle accepted by start operations
pub use tokio_util::sync::CancellationToken;
