//! Cancellable scheduled task
//!
//! One `ScheduledTask` owns at most one running background future. Starting
//! a new future stops the previous one first, and dropping the task stops it,
//! so an owner can never leak a timer or have two loops running at once.

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Slot holding at most one running background future
#[derive(Debug, Default)]
pub struct ScheduledTask {
    token: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop any running future, then spawn the one built by `make`
    ///
    /// `make` receives the cancellation token of the new run; it is cancelled
    /// whenever the run is stopped. Must be called inside a Tokio runtime.
    pub fn start<F, Fut>(&mut self, make: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.stop();

        let token = CancellationToken::new();
        let run = make(token.clone());
        let stop_signal = token.clone();

        self.handle = Some(tokio::spawn(async move {
            tokio::select! {
                _ = stop_signal.cancelled() => {}
                _ = run => {}
            }
        }));
        self.token = Some(token);
    }

    /// Cancel and abort the running future, if any
    pub fn stop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// A future is running and has not finished
    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.stop();
    }
}
