//! Orchestrator operation counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic per-operation counters
#[derive(Debug, Default)]
pub struct OrchestratorStats {
    jobs_initiated: AtomicU64,
    checks: AtomicU64,
    starts_completed: AtomicU64,
    starts_failed: AtomicU64,
    starts_cancelled: AtomicU64,
    injected_faults: AtomicU64,
    rate_limited: AtomicU64,
}

/// Point-in-time copy of [`OrchestratorStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrchestratorStatsSnapshot {
    pub jobs_initiated: u64,
    pub checks: u64,
    pub starts_completed: u64,
    pub starts_failed: u64,
    pub starts_cancelled: u64,
    pub injected_faults: u64,
    pub rate_limited: u64,
}

impl OrchestratorStatsSnapshot {
    /// Start calls that reached a verdict
    pub fn starts_finished(&self) -> u64 {
        self.starts_completed + self.starts_failed
    }

    /// Percentage of finished starts that completed
    pub fn completion_rate(&self) -> f64 {
        let finished = self.starts_finished();
        if finished == 0 {
            0.0
        } else {
            (self.starts_completed as f64 / finished as f64) * 100.0
        }
    }
}

impl OrchestratorStats {
    pub(crate) fn record_initiated(&self) {
        self.jobs_initiated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_check(&self) {
        self.checks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_start(&self, completed: bool) {
        if completed {
            self.starts_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.starts_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_cancelled(&self) {
        self.starts_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_injected_fault(&self) {
        self.injected_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> OrchestratorStatsSnapshot {
        OrchestratorStatsSnapshot {
            jobs_initiated: self.jobs_initiated.load(Ordering::Relaxed),
            checks: self.checks.load(Ordering::Relaxed),
            starts_completed: self.starts_completed.load(Ordering::Relaxed),
            starts_failed: self.starts_failed.load(Ordering::Relaxed),
            starts_cancelled: self.starts_cancelled.load(Ordering::Relaxed),
            injected_faults: self.injected_faults.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
        }
    }
}
