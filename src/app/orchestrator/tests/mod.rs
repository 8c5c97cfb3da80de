//! Unit tests for the download orchestrator
//!
//! These run against the mock availability checker, so availability is
//! decided by `id mod 7 == 0`.

#[cfg(test)]
mod integration_tests {
    use super::super::*;
    use crate::app::availability::{
        build_checker, AvailabilityChecker, AvailabilityStats, StoreConfig,
    };
    use crate::app::models::AvailabilityResult;
    use async_trait::async_trait;
    use crate::app::delay::DelayConfig;
    use crate::app::models::StartStatus;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    fn orchestrator(delay: DelayConfig) -> DownloadOrchestrator {
        let checker = build_checker(&StoreConfig::mock(), Arc::new(AvailabilityStats::default()))
            .unwrap();
        let config = OrchestratorConfigBuilder::new()
            .delay(delay)
            .rate_limit_rps(None)
            .build()
            .unwrap();
        DownloadOrchestrator::new(config, checker).unwrap()
    }

    #[tokio::test]
    async fn test_start_completes_for_present_id() {
        let orchestrator = orchestrator(DelayConfig::fixed(10));

        let result = assert_ok!(orchestrator.start(70000, CancellationToken::new()).await);

        assert_eq!(result.status(), StartStatus::Completed);
        assert_eq!(result.download_reference(), Some("downloads/70000.zip"));
        assert!(result.size().is_some());
        assert!(result.processing_time_ms() >= 10);
        assert!(result.message().starts_with("Download ready after"));
        assert_eq!(orchestrator.active_downloads(), 0);
    }

    #[tokio::test]
    async fn test_start_fails_for_absent_id() {
        let orchestrator = orchestrator(DelayConfig::fixed(10));

        let result = assert_ok!(orchestrator.start(70001, CancellationToken::new()).await);

        assert_eq!(result.status(), StartStatus::Failed);
        assert!(result.download_reference().is_none());
        assert!(result.size().is_none());
        assert!(result.processing_time_ms() >= 10);
        assert!(result.message().contains("not available"));
    }

    #[tokio::test]
    async fn test_processing_time_covers_drawn_delay() {
        let orchestrator = orchestrator(DelayConfig {
            enabled: true,
            min_ms: 5,
            max_ms: 25,
        });

        for raw in [70000, 70001, 70007, 70008] {
            let result = orchestrator.start(raw, CancellationToken::new()).await.unwrap();
            assert!(result.processing_time_ms() >= 5);
            match result.status() {
                StartStatus::Completed => {
                    assert!(result.download_reference().is_some() && result.size().is_some())
                }
                StartStatus::Failed => {
                    assert!(result.download_reference().is_none() && result.size().is_none())
                }
            }
        }
    }

    #[tokio::test]
    async fn test_disabled_delay_starts_immediately() {
        let orchestrator = orchestrator(DelayConfig::disabled());
        let result = orchestrator.start(70000, CancellationToken::new()).await.unwrap();
        assert!(result.is_completed());
        assert!(result.processing_time_ms() < 1_000);
    }

    #[tokio::test]
    async fn test_start_rejects_out_of_range_id() {
        let orchestrator = orchestrator(DelayConfig::fixed(10_000));

        let err = assert_err!(orchestrator.start(42, CancellationToken::new()).await);
        assert!(matches!(
            err,
            OrchestratorError::Validation(ValidationError::ResourceIdOutOfRange { id: 42, .. })
        ));
        assert_eq!(orchestrator.gauge().peak(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_work_and_releases_gauge() {
        let orchestrator = Arc::new(orchestrator(DelayConfig::fixed(60_000)));
        let token = CancellationToken::new();

        let task = {
            let orchestrator = Arc::clone(&orchestrator);
            let token = token.clone();
            tokio::spawn(async move { orchestrator.start(70000, token).await })
        };

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(orchestrator.active_downloads(), 1);

        token.cancel();
        let result = task.await.unwrap();

        assert!(matches!(
            result,
            Err(OrchestratorError::Cancelled { resource_id: 70000, elapsed_ms }) if elapsed_ms < 60_000
        ));
        assert_eq!(orchestrator.active_downloads(), 0);
        assert_eq!(orchestrator.stats().starts_cancelled, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_starts_share_the_gauge() {
        let orchestrator = Arc::new(orchestrator(DelayConfig::fixed(1_000)));

        let handles: Vec<_> = (0..5)
            .map(|i| {
                let orchestrator = Arc::clone(&orchestrator);
                tokio::spawn(async move {
                    orchestrator
                        .start(70000 + i, CancellationToken::new())
                        .await
                })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(orchestrator.active_downloads(), 5);

        for result in futures::future::join_all(handles).await {
            assert!(result.unwrap().is_ok());
        }
        assert_eq!(orchestrator.active_downloads(), 0);
        assert_eq!(orchestrator.gauge().peak(), 5);
        assert_eq!(orchestrator.stats().starts_finished(), 5);
    }

    #[tokio::test]
    async fn test_check_is_idempotent_on_availability() {
        let orchestrator = orchestrator(DelayConfig::disabled());
        for raw in [70000, 70001, 70007, 99_999] {
            let first = orchestrator.check(raw, false).await.unwrap().available;
            for _ in 0..5 {
                assert_eq!(orchestrator.check(raw, false).await.unwrap().available, first);
            }
        }
    }

    #[tokio::test]
    async fn test_check_fault_injection_carries_id() {
        let orchestrator = orchestrator(DelayConfig::disabled());

        for raw in [70000, 70001] {
            let err = assert_err!(orchestrator.check(raw, true).await);
            assert_eq!(err, OrchestratorError::InjectedFault { resource_id: raw });
            assert!(err.to_string().contains(&raw.to_string()));
        }
        assert_eq!(orchestrator.stats().injected_faults, 2);
        assert_eq!(orchestrator.stats().checks, 0);
    }

    #[test]
    fn test_initiate_validation() {
        let orchestrator = orchestrator(DelayConfig::disabled());

        assert_eq!(
            orchestrator.initiate(&[]).unwrap_err(),
            OrchestratorError::Validation(ValidationError::EmptyBatch)
        );

        let too_many: Vec<i64> = (0..101).map(|i| 10_000 + i).collect();
        assert!(matches!(
            orchestrator.initiate(&too_many),
            Err(OrchestratorError::Validation(ValidationError::BatchTooLarge { count: 101, max: 100 }))
        ));

        assert!(matches!(
            orchestrator.initiate(&[70000, 5]),
            Err(OrchestratorError::Validation(ValidationError::ResourceIdOutOfRange { id: 5, .. }))
        ));
    }

    #[test]
    fn test_initiate_issues_fresh_job_ids() {
        let orchestrator = orchestrator(DelayConfig::disabled());

        let first = orchestrator.initiate(&[70000, 70001, 70002]).unwrap();
        let second = orchestrator.initiate(&[70000]).unwrap();

        assert_eq!(first.count, 3);
        assert_eq!(second.count, 1);
        assert_ne!(first.job_id, second.job_id);
        assert_eq!(orchestrator.stats().jobs_initiated, 2);
        assert_eq!(orchestrator.stats().checks, 0);
    }

    #[tokio::test]
    async fn test_rate_limit_applies_to_all_operations() {
        let checker = build_checker(&StoreConfig::mock(), Arc::new(AvailabilityStats::default()))
            .unwrap();
        let config = OrchestratorConfigBuilder::new()
            .delay(DelayConfig::disabled())
            .rate_limit_rps(Some(2))
            .build()
            .unwrap();
        let orchestrator = DownloadOrchestrator::new(config, checker).unwrap();

        assert!(orchestrator.initiate(&[70000]).is_ok());
        assert!(orchestrator.check(70000, false).await.is_ok());
        assert_eq!(
            orchestrator.start(70000, CancellationToken::new()).await.unwrap_err(),
            OrchestratorError::RateLimited
        );
        assert_eq!(orchestrator.stats().rate_limited, 1);
        assert_eq!(orchestrator.gauge().peak(), 0);
    }

    /// Reports every id present but omits the size
    #[derive(Debug)]
    struct IncompleteChecker;

    #[async_trait]
    impl AvailabilityChecker for IncompleteChecker {
        async fn check(&self, id: ResourceId) -> AvailabilityResult {
            AvailabilityResult {
                available: true,
                key: Some(format!("downloads/{}.zip", id)),
                size: None,
            }
        }

        fn mode(&self) -> &'static str {
            "incomplete"
        }
    }

    #[tokio::test]
    async fn test_present_without_size_is_a_failed_start() {
        let config = OrchestratorConfigBuilder::new()
            .delay(DelayConfig::disabled())
            .rate_limit_rps(None)
            .build()
            .unwrap();
        let orchestrator = DownloadOrchestrator::new(config, Arc::new(IncompleteChecker)).unwrap();

        let result = assert_ok!(orchestrator.start(70000, CancellationToken::new()).await);

        assert_eq!(result.status(), StartStatus::Failed);
        assert!(result.download_reference().is_none());
        assert_eq!(orchestrator.stats().starts_failed, 1);
    }
}
