//! Unit tests for the resilience controller
//!
//! All tests run on paused time against a scripted service, so the timing
//! assertions are exact and the suite finishes instantly.

#[cfg(test)]
mod integration_tests {
    use super::super::*;
    use crate::app::models::{AvailabilityResult, StartResult};
    use crate::errors::{OrchestratorResult, ValidationError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    const ID: ResourceId = ResourceId::new(70000);

    #[derive(Debug, Clone, Copy)]
    enum StartOutcome {
        Complete,
        Fail,
        TransportError,
        Reject,
    }

    /// Service with scripted latency and outcomes
    struct ScriptedService {
        outcome: StartOutcome,
        start_delay: Duration,
        slow: Option<(ResourceId, Duration)>,
        available_after_checks: Option<u32>,
        check_fails: bool,
        check_delay: Duration,
        detached_start: bool,
        finished_starts: Arc<AtomicU32>,
        start_calls: AtomicU32,
        check_calls: AtomicU32,
        checks_in_flight: AtomicU32,
        max_checks_in_flight: AtomicU32,
        start_tokens: Mutex<Vec<CancellationToken>>,
    }

    impl ScriptedService {
        fn new(outcome: StartOutcome) -> Self {
            Self {
                outcome,
                start_delay: Duration::from_secs(1),
                slow: None,
                available_after_checks: None,
                check_fails: false,
                check_delay: Duration::ZERO,
                detached_start: false,
                finished_starts: Arc::new(AtomicU32::new(0)),
                start_calls: AtomicU32::new(0),
                check_calls: AtomicU32::new(0),
                checks_in_flight: AtomicU32::new(0),
                max_checks_in_flight: AtomicU32::new(0),
                start_tokens: Mutex::new(Vec::new()),
            }
        }

        fn start_delay(mut self, delay: Duration) -> Self {
            self.start_delay = delay;
            self
        }

        fn slow_for(mut self, id: ResourceId, delay: Duration) -> Self {
            self.slow = Some((id, delay));
            self
        }

        fn available_after(mut self, checks: u32) -> Self {
            self.available_after_checks = Some(checks);
            self
        }

        fn failing_checks(mut self) -> Self {
            self.check_fails = true;
            self
        }

        fn check_delay(mut self, delay: Duration) -> Self {
            self.check_delay = delay;
            self
        }

        /// Run the start work on its own task, so it finishes even after the
        /// caller drops the call
        fn detached_start(mut self) -> Self {
            self.detached_start = true;
            self
        }

        fn finished_starts(&self) -> u32 {
            self.finished_starts.load(Ordering::SeqCst)
        }

        fn max_checks_in_flight(&self) -> u32 {
            self.max_checks_in_flight.load(Ordering::SeqCst)
        }

        fn start_calls(&self) -> u32 {
            self.start_calls.load(Ordering::SeqCst)
        }

        fn check_calls(&self) -> u32 {
            self.check_calls.load(Ordering::SeqCst)
        }

        fn last_start_token(&self) -> CancellationToken {
            self.start_tokens.lock().unwrap().last().cloned().unwrap()
        }
    }

    struct InFlight<'a>(&'a AtomicU32);

    impl Drop for InFlight<'_> {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl DownloadService for ScriptedService {
        async fn start(
            &self,
            resource_id: ResourceId,
            cancel: CancellationToken,
        ) -> OrchestratorResult<StartResult> {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            self.start_tokens.lock().unwrap().push(cancel);

            let delay = match self.slow {
                Some((slow_id, delay)) if slow_id == resource_id => delay,
                _ => self.start_delay,
            };
            if self.detached_start {
                let finished = Arc::clone(&self.finished_starts);
                let work = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                });
                let _ = work.await;
            } else {
                tokio::time::sleep(delay).await;
                self.finished_starts.fetch_add(1, Ordering::SeqCst);
            }

            let elapsed = delay.as_millis() as u64;
            match self.outcome {
                StartOutcome::Complete => Ok(StartResult::completed(
                    resource_id,
                    format!("downloads/{}.zip", resource_id),
                    4096,
                    elapsed,
                )),
                StartOutcome::Fail => Ok(StartResult::failed(resource_id, elapsed)),
                StartOutcome::TransportError => Err(OrchestratorError::RateLimited),
                StartOutcome::Reject => Err(ValidationError::ResourceIdOutOfRange {
                    id: resource_id.get(),
                    min: 10_000,
                    max: 100_000_000,
                }
                .into()),
            }
        }

        async fn check(&self, resource_id: ResourceId) -> OrchestratorResult<AvailabilityResult> {
            let call = self.check_calls.fetch_add(1, Ordering::SeqCst) + 1;
            let now = self.checks_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_checks_in_flight.fetch_max(now, Ordering::SeqCst);
            let _guard = InFlight(&self.checks_in_flight);

            tokio::time::sleep(self.check_delay).await;

            if self.check_fails {
                return Err(OrchestratorError::InjectedFault {
                    resource_id: resource_id.get(),
                });
            }
            match self.available_after_checks {
                Some(after) if call >= after => Ok(AvailabilityResult::found(
                    format!("downloads/{}.zip", resource_id),
                    4096,
                )),
                _ => Ok(AvailabilityResult::not_found()),
            }
        }
    }

    fn test_config() -> ControllerConfig {
        ControllerConfigBuilder::new()
            .abort_timeout(Duration::from_secs(10))
            .poll_interval(Duration::from_secs(1))
            .max_poll_attempts(5)
            .max_attempts(3)
            .build()
            .unwrap()
    }

    fn controller(service: &Arc<ScriptedService>) -> ResilienceController {
        ResilienceController::new(service.clone(), test_config()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_start_completes() {
        let service = Arc::new(ScriptedService::new(StartOutcome::Complete));
        let controller = controller(&service);

        assert_ok!(controller.start(ID));
        assert_eq!(controller.item(ID).unwrap().state, ItemState::Starting);

        let item = controller.await_terminal(ID).await.unwrap();
        assert_eq!(item.state, ItemState::Completed);
        assert_eq!(item.progress, 100);
        assert_eq!(item.download_reference.as_deref(), Some("downloads/70000.zip"));
        assert_eq!(item.size, Some(4096));
        assert_eq!(service.check_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_failure_is_terminal_without_polling() {
        let service = Arc::new(ScriptedService::new(StartOutcome::Fail));
        let controller = controller(&service);

        controller.start(ID).unwrap();
        let item = controller.await_terminal(ID).await.unwrap();

        assert_eq!(item.state, ItemState::Failed);
        assert!(item.last_message.contains("not available"));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(service.check_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_error_is_rejected_not_polled() {
        let service = Arc::new(ScriptedService::new(StartOutcome::Reject));
        let controller = controller(&service);

        controller.start(ID).unwrap();
        let item = controller.await_terminal(ID).await.unwrap();

        assert_eq!(item.state, ItemState::Failed);
        assert!(item.last_message.starts_with(messages::REJECTED));
        assert_eq!(service.check_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_timeout_falls_back_to_polling() {
        let service = Arc::new(
            ScriptedService::new(StartOutcome::Complete).start_delay(Duration::from_secs(60)),
        );
        let controller = controller(&service);

        controller.start(ID).unwrap();
        tokio::time::sleep(Duration::from_millis(9_500)).await;
        assert_eq!(controller.item(ID).unwrap().state, ItemState::Starting);
        assert!(!service.last_start_token().is_cancelled());

        tokio::time::sleep(Duration::from_secs(1)).await;
        let item = controller.item(ID).unwrap();
        assert_eq!(item.state, ItemState::Polling);
        assert_eq!(item.last_message, messages::POLLING);
        assert!(service.last_start_token().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_finds_object_on_third_check() {
        let service = Arc::new(
            ScriptedService::new(StartOutcome::Complete)
                .start_delay(Duration::from_secs(60))
                .available_after(3),
        );
        let controller = controller(&service);

        controller.start(ID).unwrap();
        let item = controller.await_terminal(ID).await.unwrap();

        assert_eq!(item.state, ItemState::Available);
        assert_eq!(item.polls, 3);
        assert_eq!(item.progress, 100);
        assert_eq!(item.last_message, messages::AVAILABLE);
        assert_eq!(service.check_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_exhaustion_stops_checks() {
        let service = Arc::new(
            ScriptedService::new(StartOutcome::Complete).start_delay(Duration::from_secs(60)),
        );
        let controller = controller(&service);
        let started = Instant::now();

        controller.start(ID).unwrap();
        let item = controller.await_terminal(ID).await.unwrap();

        assert_eq!(item.state, ItemState::Failed);
        assert_eq!(item.last_message, messages::EXHAUSTED);
        assert_eq!(item.polls, 5);
        // abort timeout plus five poll intervals
        assert!(started.elapsed() >= Duration::from_secs(15));
        assert!(started.elapsed() < Duration::from_secs(16));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(service.check_calls(), 5);
        assert!(!controller.is_active(ID));
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_errors_keep_polling_until_cap() {
        let service = Arc::new(ScriptedService::new(StartOutcome::TransportError).failing_checks());
        let controller = controller(&service);

        controller.start(ID).unwrap();
        let item = controller.await_terminal(ID).await.unwrap();

        assert_eq!(item.state, ItemState::Failed);
        assert_eq!(item.last_message, messages::EXHAUSTED);
        assert_eq!(service.check_calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_enters_polling() {
        let service =
            Arc::new(ScriptedService::new(StartOutcome::TransportError).available_after(1));
        let controller = controller(&service);
        let mut events = controller.subscribe();

        controller.start(ID).unwrap();
        let item = controller.await_terminal(ID).await.unwrap();
        assert_eq!(item.state, ItemState::Available);

        let mut states = Vec::new();
        while let Ok(event) = events.try_recv() {
            states.push(event.state);
        }
        assert_eq!(
            states,
            vec![ItemState::Starting, ItemState::Polling, ItemState::Available]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_check_is_allowed_to_finish() {
        let service = Arc::new(
            ScriptedService::new(StartOutcome::TransportError)
                .check_delay(Duration::from_millis(1_500))
                .available_after(1),
        );
        let controller = controller(&service);
        let started = Instant::now();

        controller.start(ID).unwrap();
        let item = controller.await_terminal(ID).await.unwrap();

        // Polling from 1s; the check issued at 2s returns at 3.5s, past the 3s tick
        assert_eq!(item.state, ItemState::Available);
        assert_eq!(item.polls, 2);
        assert_eq!(item.download_reference.as_deref(), Some("downloads/70000.zip"));
        assert_eq!(service.check_calls(), 1);
        assert!(started.elapsed() >= Duration::from_millis(3_500));
        assert!(started.elapsed() < Duration::from_millis(3_600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_checks_never_overlap_and_still_exhaust() {
        let service = Arc::new(
            ScriptedService::new(StartOutcome::TransportError)
                .check_delay(Duration::from_millis(2_500)),
        );
        let controller = controller(&service);
        let started = Instant::now();

        controller.start(ID).unwrap();
        let item = controller.await_terminal(ID).await.unwrap();

        assert_eq!(item.state, ItemState::Failed);
        assert_eq!(item.last_message, messages::EXHAUSTED);
        assert_eq!(item.polls, 5);
        // Checks issued at 2s and 5s; the 7s tick ends polling with the second outstanding
        assert_eq!(service.check_calls(), 2);
        assert_eq!(service.max_checks_in_flight(), 1);
        assert!(started.elapsed() >= Duration::from_secs(7));
        assert!(started.elapsed() < Duration::from_millis(7_100));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(service.check_calls(), 2);
        assert_eq!(service.checks_in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_is_enforced() {
        let service = Arc::new(ScriptedService::new(StartOutcome::Fail));
        let controller = controller(&service);

        controller.start(ID).unwrap();
        controller.await_terminal(ID).await.unwrap();

        for expected in 1..=3 {
            assert!(controller.retry(ID).unwrap());
            let item = controller.await_terminal(ID).await.unwrap();
            assert_eq!(item.attempts, expected);
            assert_eq!(item.state, ItemState::Failed);
        }

        assert!(!controller.retry(ID).unwrap());
        let item = controller.item(ID).unwrap();
        assert_eq!(item.attempts, 3);
        assert_eq!(item.state, ItemState::Failed);
        assert_eq!(service.start_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_ignored_while_in_flight() {
        let service = Arc::new(
            ScriptedService::new(StartOutcome::Complete).start_delay(Duration::from_secs(5)),
        );
        let controller = controller(&service);

        assert!(matches!(
            controller.retry(ID),
            Err(ControllerError::NotTracked { resource_id: 70000 })
        ));

        controller.start(ID).unwrap();
        assert!(!controller.retry(ID).unwrap());
        assert_eq!(controller.item(ID).unwrap().attempts, 0);

        controller.await_terminal(ID).await.unwrap();
        assert_eq!(service.start_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_requires_idle() {
        let service = Arc::new(ScriptedService::new(StartOutcome::Complete));
        let controller = controller(&service);

        let item = assert_ok!(controller.track(ID));
        assert_eq!(item.state, ItemState::Idle);
        assert!(matches!(
            controller.track(ID),
            Err(ControllerError::AlreadyTracked { .. })
        ));

        controller.start(ID).unwrap();
        let err = assert_err!(controller.start(ID));
        assert!(matches!(
            err,
            ControllerError::InvalidTransition { action: "start", .. }
        ));
        assert_eq!(service.start_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_stops_polling() {
        let service = Arc::new(ScriptedService::new(StartOutcome::TransportError));
        let controller = controller(&service);
        let mut events = controller.subscribe();

        controller.start(ID).unwrap();
        tokio::time::sleep(Duration::from_millis(4_500)).await;
        assert_eq!(service.check_calls(), 3);
        assert!(controller.is_active(ID));

        let removed = controller.remove(ID).unwrap();
        assert_eq!(removed.state, ItemState::Polling);
        assert!(controller.item(ID).is_none());
        assert!(controller.await_terminal(ID).await.is_none());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(service.check_calls(), 3);

        let mut last = None;
        while let Ok(event) = events.try_recv() {
            last = Some(event);
        }
        assert!(last.unwrap().removed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_attempt_cannot_update_state() {
        let service = Arc::new(
            ScriptedService::new(StartOutcome::Fail).start_delay(Duration::from_secs(5)),
        );
        let controller = controller(&service);

        controller.start(ID).unwrap();
        controller.await_terminal(ID).await.unwrap();
        controller.retry(ID).unwrap();

        let applied = controller.shared.transition(ID, 1, |item| {
            item.mark_available(&AvailabilityResult::found("downloads/70000.zip", 1))
        });
        assert!(!applied);
        assert_eq!(controller.item(ID).unwrap().state, ItemState::Starting);

        let item = controller.await_terminal(ID).await.unwrap();
        assert_eq!(item.state, ItemState::Failed);
        assert_eq!(item.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_start_response_is_ignored() {
        let service = Arc::new(
            ScriptedService::new(StartOutcome::Complete)
                .start_delay(Duration::from_secs(12))
                .detached_start(),
        );
        let controller = controller(&service);

        controller.start(ID).unwrap();
        tokio::time::sleep(Duration::from_millis(12_500)).await;

        // The server-side work completed after the abort timeout
        assert_eq!(service.finished_starts(), 1);
        let item = controller.item(ID).unwrap();
        assert_eq!(item.state, ItemState::Polling);
        assert!(item.download_reference.is_none());
        assert_eq!(service.check_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_items_progress_independently() {
        let slow = ResourceId::new(70001);
        let service = Arc::new(
            ScriptedService::new(StartOutcome::Complete)
                .slow_for(slow, Duration::from_secs(60))
                .available_after(2),
        );
        let controller = controller(&service);

        controller.start(ID).unwrap();
        controller.start(slow).unwrap();
        assert_eq!(controller.active_count(), 2);

        let fast_item = controller.await_terminal(ID).await.unwrap();
        assert_eq!(fast_item.state, ItemState::Completed);
        assert_eq!(controller.item(slow).unwrap().state, ItemState::Starting);

        let slow_item = controller.await_terminal(slow).await.unwrap();
        assert_eq!(slow_item.state, ItemState::Available);
        assert_eq!(service.check_calls(), 2);

        let ids: Vec<_> = controller.items().iter().map(|item| item.resource_id).collect();
        assert_eq!(ids, vec![ID, slow]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_all_tasks() {
        let service = Arc::new(ScriptedService::new(StartOutcome::TransportError));
        let controller = controller(&service);
        let settled = ResourceId::new(70002);

        controller.track(settled).unwrap();
        controller.start(ID).unwrap();
        controller.start(ResourceId::new(70001)).unwrap();
        tokio::time::sleep(Duration::from_millis(2_500)).await;

        controller.shutdown();
        let seen = service.check_calls();
        assert_eq!(seen, 2);
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(service.check_calls(), seen);
        assert_eq!(controller.active_count(), 0);
        let item = controller.item(ID).unwrap();
        assert_eq!(item.state, ItemState::Failed);
        assert_eq!(item.last_message, messages::CANCELLED);
        assert_eq!(controller.item(settled).unwrap().state, ItemState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_releases_waiters_and_allows_retry() {
        let service = Arc::new(
            ScriptedService::new(StartOutcome::Complete).start_delay(Duration::from_secs(5)),
        );
        let controller = controller(&service);

        controller.start(ID).unwrap();
        let (item, _) = tokio::join!(controller.await_terminal(ID), async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            controller.shutdown();
        });

        let item = item.unwrap();
        assert_eq!(item.state, ItemState::Failed);
        assert_eq!(item.last_message, messages::CANCELLED);
        assert_eq!(service.finished_starts(), 0);

        assert!(controller.retry(ID).unwrap());
        let item = controller.await_terminal(ID).await.unwrap();
        assert_eq!(item.state, ItemState::Completed);
        assert_eq!(item.attempts, 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let service = Arc::new(ScriptedService::new(StartOutcome::Complete));
        let config = ControllerConfig {
            poll_interval: Duration::ZERO,
            ..ControllerConfig::default()
        };
        assert!(ResilienceController::new(service, config).is_err());
    }
}
