//! Command handlers for the CLI
//!
//! Every handler builds its components from the loaded [`AppConfig`], runs one
//! operation and prints the result. Orchestrator payloads are printed as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::{
    build_checker, AvailabilityStats, DownloadOrchestrator, ItemState, ResilienceController,
    ResourceId,
};
use crate::cli::args::{CheckArgs, ConfigAction, InitiateArgs, StartArgs, TrackArgs};
use crate::cli::progress::TrackProgress;
use crate::config::AppConfig;
use crate::errors::{AppError, Result};

/// Build an orchestrator with the configured availability checker
pub fn build_orchestrator(config: &AppConfig) -> Result<DownloadOrchestrator> {
    let (orchestrator_config, store_config, _) = config.to_runtime_config();
    let checker = build_checker(&store_config, Arc::new(AvailabilityStats::default()))?;
    debug!("Availability mode: {}", checker.mode());
    Ok(DownloadOrchestrator::new(orchestrator_config, checker)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Handle the check command
pub async fn handle_check(args: CheckArgs, config: &AppConfig) -> Result<()> {
    let orchestrator = build_orchestrator(config)?;
    let result = orchestrator.check(args.id, args.test_error).await?;
    print_json(&result)
}

/// Handle the start command
///
/// Ctrl+C cancels the running attempt instead of leaving it to finish.
pub async fn handle_start(args: StartArgs, config: &AppConfig) -> Result<()> {
    let mut config = config.clone();
    if args.no_delay {
        config.delay.enabled = false;
    }
    let orchestrator = build_orchestrator(&config)?;

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; cancelling start");
                cancel.cancel();
            }
        })
    };

    let outcome = orchestrator.start(args.id, cancel).await;
    interrupt.abort();

    print_json(&outcome?)
}

/// Handle the initiate command
pub async fn handle_initiate(args: InitiateArgs, config: &AppConfig) -> Result<()> {
    let orchestrator = build_orchestrator(config)?;
    let receipt = orchestrator.initiate(&args.ids)?;
    print_json(&receipt)
}

/// Handle the track command
///
/// Starts every id through the resilience controller and waits until all of
/// them settle. With `--auto-retry`, failed items are retried as long as their
/// retry budget allows.
pub async fn handle_track(args: TrackArgs, config: &AppConfig, quiet: bool) -> Result<()> {
    args.validate().map_err(AppError::generic)?;

    let ids: Vec<ResourceId> = args.ids.iter().copied().map(ResourceId::new).collect();
    let orchestrator = Arc::new(build_orchestrator(config)?);
    let (_, _, controller_config) = config.to_runtime_config();
    let controller = ResilienceController::new(orchestrator.clone(), controller_config)?;

    let display = TrackProgress::new(&ids, !args.no_progress && !quiet)?;
    let mut events = controller.subscribe();

    info!("Tracking {} item(s)", ids.len());
    for &id in &ids {
        controller.start(id)?;
    }

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    while !is_settled(&controller, args.auto_retry) {
        tokio::select! {
            _ = &mut interrupt => {
                warn!("Interrupted; stopping all in-flight work");
                controller.shutdown();
                break;
            }
            received = events.recv() => match received {
                Ok(event) => {
                    display.apply(&event);
                    if args.auto_retry && event.state == ItemState::Failed {
                        controller.retry(event.resource_id)?;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Skipped {} item events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    // Render anything still queued
    while let Ok(event) = events.try_recv() {
        display.apply(&event);
    }
    display.finish();

    if !quiet {
        println!();
        for item in controller.items() {
            println!(
                "{:>10}  {:<9}  retries {}  {}",
                item.resource_id, item.state, item.attempts, item.last_message
            );
        }
    }

    let stats = orchestrator.stats();
    debug!(
        "Orchestrator: {} completed, {} failed, {} cancelled starts",
        stats.starts_completed, stats.starts_failed, stats.starts_cancelled
    );
    Ok(())
}

fn is_settled(controller: &ResilienceController, auto_retry: bool) -> bool {
    let max_attempts = controller.config().max_attempts;
    controller.items().iter().all(|item| {
        let retry_pending =
            auto_retry && item.state == ItemState::Failed && item.can_retry(max_attempts);
        item.state.is_terminal() && !retry_pending
    })
}

/// Handle config management
pub async fn handle_config(action: ConfigAction, config_override: Option<PathBuf>) -> Result<()> {
    match action {
        ConfigAction::Init { path, force } => {
            let written = AppConfig::write_default(path.or(config_override), force).await?;
            println!("Created configuration file: {}", written.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = AppConfig::load(config_override).await?;
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}
