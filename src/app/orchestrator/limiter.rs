//! Process-wide request limiting
//!
//! Wraps a direct (unkeyed) governor rate limiter. Calls over quota are
//! rejected immediately rather than queued, which is how an HTTP front end
//! answers with 429.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use tracing::debug;

use crate::errors::{ConfigError, ConfigResult, OrchestratorError, OrchestratorResult};

/// Shared request limiter handle
#[derive(Debug)]
pub struct RequestLimiter {
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    rate_limit_rps: u32,
}

impl RequestLimiter {
    /// Build a limiter allowing `rate_limit_rps` requests per second
    pub fn new(rate_limit_rps: u32) -> ConfigResult<Arc<Self>> {
        let rps = NonZeroU32::new(rate_limit_rps).ok_or_else(|| ConfigError::InvalidValue {
            field: "server.rate_limit_rps".to_string(),
            value: rate_limit_rps.to_string(),
            reason: "Rate limit must be non-zero".to_string(),
        })?;

        Ok(Arc::new(Self {
            rate_limiter: RateLimiter::direct(Quota::per_second(rps)),
            rate_limit_rps,
        }))
    }

    /// Take one unit of quota or fail with `RateLimited`
    pub fn check(&self) -> OrchestratorResult<()> {
        self.rate_limiter.check().map_err(|_| {
            debug!("Request rejected: limit of {} rps reached", self.rate_limit_rps);
            OrchestratorError::RateLimited
        })
    }

    pub fn rate_limit_rps(&self) -> u32 {
        self.rate_limit_rps
    }
}
