//! Server-side download orchestration
//!
//! The orchestrator exposes three stateless operations:
//!
//! - [`initiate`](DownloadOrchestrator::initiate): validate a batch of ids and
//!   hand back a fresh [`JobId`] without doing any work.
//! - [`check`](DownloadOrchestrator::check): a pure availability probe, with an
//!   optional deliberate fault for exercising error reporting.
//! - [`start`](DownloadOrchestrator::start): simulate the processing delay,
//!   check availability and return a terminal [`StartResult`].
//!
//! `start` never retries. Retry policy belongs to the caller, so the caller
//! can reason about its own timeout boundaries.
//!
//! # Shared state
//!
//! The only shared mutable state is the [`ActiveGauge`] (in-flight starts) and
//! the optional [`RequestLimiter`], both injected as `Arc` handles.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use delayed_fetch::app::availability::{build_checker, AvailabilityStats, StoreConfig};
//! use delayed_fetch::app::orchestrator::{DownloadOrchestrator, OrchestratorConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let checker = build_checker(&StoreConfig::mock(), Arc::new(AvailabilityStats::default()))?;
//! let orchestrator = DownloadOrchestrator::new(OrchestratorConfig::default(), checker)?;
//!
//! let result = orchestrator.start(70000, CancellationToken::new()).await?;
//! println!("{}: {}", result.status(), result.message());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod gauge;
pub mod limiter;
pub mod stats;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::availability::AvailabilityChecker;
use crate::app::delay::DelaySimulator;
use crate::app::models::{AvailabilityResult, InitiateReceipt, JobId, ResourceId, StartResult};
use crate::errors::{ConfigResult, OrchestratorError, OrchestratorResult, ValidationError};

pub use config::{OrchestratorConfig, OrchestratorConfigBuilder};
pub use gauge::{ActiveGauge, GaugeGuard};
pub use limiter::RequestLimiter;
pub use stats::{OrchestratorStats, OrchestratorStatsSnapshot};

/// Stateless download orchestrator
#[derive(Debug)]
pub struct DownloadOrchestrator {
    config: OrchestratorConfig,
    checker: Arc<dyn AvailabilityChecker>,
    delay: DelaySimulator,
    gauge: Arc<ActiveGauge>,
    limiter: Option<Arc<RequestLimiter>>,
    stats: OrchestratorStats,
}

impl DownloadOrchestrator {
    /// Create an orchestrator with its own gauge and, if configured, its own limiter
    pub fn new(
        config: OrchestratorConfig,
        checker: Arc<dyn AvailabilityChecker>,
    ) -> ConfigResult<Self> {
        config.validate()?;

        let limiter = config.rate_limit_rps.map(RequestLimiter::new).transpose()?;

        Ok(Self {
            delay: DelaySimulator::new(config.delay),
            config,
            checker,
            gauge: ActiveGauge::new(),
            limiter,
            stats: OrchestratorStats::default(),
        })
    }

    /// Share an existing gauge (e.g. one exported to a metrics endpoint)
    pub fn with_gauge(mut self, gauge: Arc<ActiveGauge>) -> Self {
        self.gauge = gauge;
        self
    }

    /// Replace the request limiter; `None` disables limiting
    pub fn with_limiter(mut self, limiter: Option<Arc<RequestLimiter>>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn gauge(&self) -> &Arc<ActiveGauge> {
        &self.gauge
    }

    /// Start operations currently in flight
    pub fn active_downloads(&self) -> usize {
        self.gauge.active()
    }

    pub fn stats(&self) -> OrchestratorStatsSnapshot {
        self.stats.snapshot()
    }

    /// Accept a batch of ids and issue a correlation handle
    ///
    /// Nothing is checked or scheduled; the job id is not tracked afterwards.
    pub fn initiate(&self, resource_ids: &[i64]) -> OrchestratorResult<InitiateReceipt> {
        self.admit()?;

        if resource_ids.is_empty() {
            return Err(ValidationError::EmptyBatch.into());
        }
        if resource_ids.len() > self.config.max_batch_size {
            return Err(ValidationError::BatchTooLarge {
                count: resource_ids.len(),
                max: self.config.max_batch_size,
            }
            .into());
        }
        for &raw in resource_ids {
            self.config.bounds.validate(raw)?;
        }

        let receipt = InitiateReceipt {
            job_id: JobId::generate(),
            count: resource_ids.len(),
            accepted_at: Utc::now(),
        };
        self.stats.record_initiated();
        info!(
            "Accepted job {} for {} resource id(s)",
            receipt.job_id, receipt.count
        );
        Ok(receipt)
    }

    /// Probe availability of a single id
    ///
    /// With `test_error` set this always fails with
    /// [`OrchestratorError::InjectedFault`] carrying the id.
    pub async fn check(
        &self,
        resource_id: i64,
        test_error: bool,
    ) -> OrchestratorResult<AvailabilityResult> {
        self.admit()?;
        let id = self.config.bounds.validate(resource_id)?;

        if test_error {
            self.stats.record_injected_fault();
            warn!(resource_id = id.get(), "Test error requested on check");
            return Err(OrchestratorError::InjectedFault {
                resource_id: id.get(),
            });
        }

        self.stats.record_check();
        let result = self.checker.check(id).await;
        debug!("Check {}: available={}", id, result.available);
        Ok(result)
    }

    /// Run one start attempt to a definite verdict
    ///
    /// Cancelling `cancel` ends the attempt early with
    /// [`OrchestratorError::Cancelled`]. Pass a token that is never cancelled
    /// to let the work always run to completion.
    pub async fn start(
        &self,
        resource_id: i64,
        cancel: CancellationToken,
    ) -> OrchestratorResult<StartResult> {
        self.admit()?;
        let id = self.config.bounds.validate(resource_id)?;

        let started = Instant::now();
        let _active = self.gauge.acquire();

        let delay = self.delay.next_delay();
        debug!("Start {}: simulating {:?} of processing", id, delay);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(self.cancelled(id, started)),
            _ = tokio::time::sleep(delay) => {}
        }

        let availability = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(self.cancelled(id, started)),
            result = self.checker.check(id) => result,
        };

        let processing_time_ms = elapsed_ms(started);
        let result = match (availability.available, availability.key, availability.size) {
            (true, Some(key), Some(size)) => {
                StartResult::completed(id, key, size, processing_time_ms)
            }
            (true, key, size) => {
                warn!(
                    "{} checker reported {} available without key or size (key={:?}, size={:?})",
                    self.checker.mode(),
                    id,
                    key,
                    size
                );
                StartResult::failed(id, processing_time_ms)
            }
            (false, _, _) => StartResult::failed(id, processing_time_ms),
        };

        self.stats.record_start(result.is_completed());
        info!(
            "Start {} finished: {} in {}ms",
            id,
            result.status(),
            processing_time_ms
        );
        Ok(result)
    }

    fn admit(&self) -> OrchestratorResult<()> {
        if let Some(limiter) = &self.limiter {
            limiter.check().map_err(|e| {
                self.stats.record_rate_limited();
                e
            })?;
        }
        Ok(())
    }

    fn cancelled(&self, id: ResourceId, started: Instant) -> OrchestratorError {
        let elapsed_ms = elapsed_ms(started);
        self.stats.record_cancelled();
        info!("Start {} cancelled by caller after {}ms", id, elapsed_ms);
        OrchestratorError::Cancelled {
            resource_id: id.get(),
            elapsed_ms,
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
