//! Active-download gauge
//!
//! Shared counter of start operations currently in progress. Owned through an
//! `Arc` handle so every orchestrator (or test harness) can have its own.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Atomic in-flight counter with a high-water mark
#[derive(Debug, Default)]
pub struct ActiveGauge {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ActiveGauge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Increment the gauge; it is decremented when the guard drops
    pub fn acquire(self: &Arc<Self>) -> GaugeGuard {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard {
            gauge: Arc::clone(self),
        }
    }

    /// Operations currently in flight
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Highest concurrent value observed
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Releases one unit of an [`ActiveGauge`] on drop
#[derive(Debug)]
#[must_use = "the gauge is released as soon as the guard is dropped"]
pub struct GaugeGuard {
    gauge: Arc<ActiveGauge>,
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.gauge.active.fetch_sub(1, Ordering::SeqCst);
    }
}
