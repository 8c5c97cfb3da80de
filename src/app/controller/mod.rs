//! Client-side resilience for slow start operations
//!
//! The controller drives one state machine per tracked resource id:
//!
//! ```text
//! Idle --start--> Starting --Completed--> Completed
//!                          --Failed-----> Failed
//!                          --timeout / transport error--> Polling
//! Polling --available--> Available
//!         --cap reached--> Failed ("Timed out waiting for availability")
//! Starting | Polling --shutdown--> Failed ("Cancelled before completion")
//! Completed | Failed | Available --retry (budget left)--> Starting
//! ```
//!
//! A direct start call runs under a hard client-side abort timeout. When it
//! times out or fails in transit, the call is abandoned (its future dropped and
//! its cancellation token fired) and the controller falls back to polling the
//! lightweight availability check at a fixed interval, up to a fixed number of
//! checks.
//!
//! # Ordering
//!
//! Every tracked entry owns a single [`ScheduledTask`], so at most one start
//! call or polling loop exists per id; launching a new attempt stops the old
//! one first. Each attempt also carries a generation number, and transitions
//! from a superseded generation are discarded, so a late response can never
//! update state. Entries for different ids share nothing but the lock
//! protecting the map.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use delayed_fetch::app::availability::{build_checker, AvailabilityStats, StoreConfig};
//! use delayed_fetch::app::controller::{ControllerConfig, ResilienceController};
//! use delayed_fetch::app::models::ResourceId;
//! use delayed_fetch::app::orchestrator::{DownloadOrchestrator, OrchestratorConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let checker = build_checker(&StoreConfig::mock(), Arc::new(AvailabilityStats::default()))?;
//! let orchestrator = Arc::new(DownloadOrchestrator::new(OrchestratorConfig::default(), checker)?);
//! let controller = ResilienceController::new(orchestrator, ControllerConfig::default())?;
//!
//! let id = ResourceId::new(70000);
//! controller.start(id)?;
//! if let Some(item) = controller.await_terminal(id).await {
//!     println!("{}: {}", item.state, item.last_message);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod service;
pub mod task;
pub mod types;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::models::{AvailabilityResult, ResourceId};
use crate::errors::{
    ConfigResult, ControllerError, ControllerResult, OrchestratorError, OrchestratorResult,
};

pub use config::{ControllerConfig, ControllerConfigBuilder};
pub use service::DownloadService;
pub use task::ScheduledTask;
pub use types::{messages, ClientItem, ItemEvent, ItemState};

/// Per-id state machines with timeout, fallback polling and bounded retries
pub struct ResilienceController {
    shared: Arc<Shared>,
}

struct Shared {
    config: ControllerConfig,
    service: Arc<dyn DownloadService>,
    entries: Mutex<HashMap<ResourceId, Entry>>,
    events: broadcast::Sender<ItemEvent>,
}

struct Entry {
    item: ClientItem,
    generation: u64,
    task: ScheduledTask,
}

impl Entry {
    fn new(resource_id: ResourceId) -> Self {
        Self {
            item: ClientItem::new(resource_id),
            generation: 0,
            task: ScheduledTask::new(),
        }
    }
}

impl ResilienceController {
    /// Create a controller talking to `service`
    pub fn new(service: Arc<dyn DownloadService>, config: ControllerConfig) -> ConfigResult<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(config.event_buffer_size);

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                service,
                entries: Mutex::new(HashMap::new()),
                events,
            }),
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.shared.config
    }

    /// Receive an event for every item change
    pub fn subscribe(&self) -> broadcast::Receiver<ItemEvent> {
        self.shared.events.subscribe()
    }

    /// Begin tracking `resource_id` in the idle state
    pub fn track(&self, resource_id: ResourceId) -> ControllerResult<ClientItem> {
        let item = {
            let mut entries = self.shared.lock();
            if entries.contains_key(&resource_id) {
                return Err(ControllerError::AlreadyTracked {
                    resource_id: resource_id.get(),
                });
            }
            let entry = entries
                .entry(resource_id)
                .or_insert_with(|| Entry::new(resource_id));
            entry.item.clone()
        };

        debug!("Tracking {}", resource_id);
        self.shared.publish(ItemEvent::from(&item));
        Ok(item)
    }

    /// Make the first attempt for `resource_id`, tracking it if needed
    ///
    /// Only allowed from the idle state; use [`retry`](Self::retry) after a
    /// terminal state. Must be called inside a Tokio runtime.
    pub fn start(&self, resource_id: ResourceId) -> ControllerResult<()> {
        let event = {
            let mut entries = self.shared.lock();
            let entry = entries
                .entry(resource_id)
                .or_insert_with(|| Entry::new(resource_id));

            if entry.item.state != ItemState::Idle {
                return Err(ControllerError::InvalidTransition {
                    resource_id: resource_id.get(),
                    action: "start",
                    state: entry.item.state.to_string(),
                });
            }

            self.launch(entry, resource_id)
        };

        info!("Starting {}", resource_id);
        self.shared.publish(event);
        Ok(())
    }

    /// Re-enter `Starting` from a terminal state
    ///
    /// Returns `Ok(false)` without touching state when the item is not in a
    /// terminal state or its retry budget is spent.
    pub fn retry(&self, resource_id: ResourceId) -> ControllerResult<bool> {
        let max_attempts = self.shared.config.max_attempts;

        let event = {
            let mut entries = self.shared.lock();
            let entry = entries
                .get_mut(&resource_id)
                .ok_or(ControllerError::NotTracked {
                    resource_id: resource_id.get(),
                })?;

            if !entry.item.can_retry(max_attempts) {
                debug!(
                    "Retry ignored for {} ({}, {}/{} retries used)",
                    resource_id, entry.item.state, entry.item.attempts, max_attempts
                );
                return Ok(false);
            }

            entry.item.attempts += 1;
            self.launch(entry, resource_id)
        };

        info!(
            "Retrying {} (retry {}/{})",
            resource_id, event.attempts, max_attempts
        );
        self.shared.publish(event);
        Ok(true)
    }

    /// Stop tracking `resource_id`, stopping its start call or polling loop
    pub fn remove(&self, resource_id: ResourceId) -> Option<ClientItem> {
        let removed = self.shared.lock().remove(&resource_id);
        let mut entry = removed?;
        entry.task.stop();

        debug!("Removed {} ({})", resource_id, entry.item.state);
        let mut event = ItemEvent::from(&entry.item);
        event.removed = true;
        self.shared.publish(event);
        Some(entry.item)
    }

    /// Snapshot of one item
    pub fn item(&self, resource_id: ResourceId) -> Option<ClientItem> {
        self.shared
            .lock()
            .get(&resource_id)
            .map(|entry| entry.item.clone())
    }

    /// Snapshot of all items, ordered by id
    pub fn items(&self) -> Vec<ClientItem> {
        let mut items: Vec<ClientItem> = self
            .shared
            .lock()
            .values()
            .map(|entry| entry.item.clone())
            .collect();
        items.sort_by_key(|item| item.resource_id);
        items
    }

    /// Whether a start call or polling loop is running for `resource_id`
    pub fn is_active(&self, resource_id: ResourceId) -> bool {
        self.shared
            .lock()
            .get(&resource_id)
            .is_some_and(|entry| entry.task.is_active())
    }

    /// Number of ids with a running start call or polling loop
    pub fn active_count(&self) -> usize {
        self.shared
            .lock()
            .values()
            .filter(|entry| entry.task.is_active())
            .count()
    }

    /// Wait until `resource_id` is in a terminal state
    ///
    /// Returns immediately for idle items, and `None` if the item is not (or
    /// stops being) tracked.
    pub async fn await_terminal(&self, resource_id: ResourceId) -> Option<ClientItem> {
        let mut events = self.subscribe();
        loop {
            let item = self.item(resource_id)?;
            if item.state.is_terminal() || item.state == ItemState::Idle {
                return Some(item);
            }

            match events.recv().await {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return self.item(resource_id),
            }
        }
    }

    /// Stop every start call and polling loop
    ///
    /// Items that were starting or polling end as `Failed` with a cancellation
    /// message, so they can be retried and waiters on them return. Settled
    /// items keep their state.
    pub fn shutdown(&self) {
        let events: Vec<ItemEvent> = {
            let mut entries = self.shared.lock();
            let mut events = Vec::new();
            for entry in entries.values_mut() {
                entry.task.stop();
                if entry.item.state.is_in_flight() {
                    // Outdates any transition the stopped task had pending
                    entry.generation += 1;
                    entry.item.cancel();
                    events.push(ItemEvent::from(&entry.item));
                }
            }
            debug!(
                "Stopped tasks for {} tracked item(s), {} cancelled",
                entries.len(),
                events.len()
            );
            events
        };

        for event in events {
            self.shared.publish(event);
        }
    }

    fn launch(&self, entry: &mut Entry, resource_id: ResourceId) -> ItemEvent {
        entry.generation += 1;
        let generation = entry.generation;
        entry.item.begin_attempt();

        let shared = Arc::clone(&self.shared);
        entry
            .task
            .start(move |stop| run_attempt(shared, resource_id, generation, stop));

        ItemEvent::from(&entry.item)
    }
}

impl Drop for ResilienceController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ResilienceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilienceController")
            .field("config", &self.shared.config)
            .field("tracked", &self.shared.lock().len())
            .finish()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, HashMap<ResourceId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: ItemEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Apply `update` if `generation` is still the item's current attempt
    fn transition(
        &self,
        resource_id: ResourceId,
        generation: u64,
        update: impl FnOnce(&mut ClientItem),
    ) -> bool {
        let event = {
            let mut entries = self.lock();
            let Some(entry) = entries.get_mut(&resource_id) else {
                return false;
            };
            if entry.generation != generation {
                debug!(
                    "Discarding stale update for {} (attempt {} superseded by {})",
                    resource_id, generation, entry.generation
                );
                return false;
            }
            update(&mut entry.item);
            ItemEvent::from(&entry.item)
        };

        self.publish(event);
        true
    }
}

/// One attempt: direct start under the abort timeout, then fallback polling
async fn run_attempt(
    shared: Arc<Shared>,
    resource_id: ResourceId,
    generation: u64,
    stop: CancellationToken,
) {
    let abort_timeout = shared.config.abort_timeout;
    let call_token = stop.child_token();

    let outcome = tokio::time::timeout(
        abort_timeout,
        shared.service.start(resource_id, call_token.clone()),
    )
    .await;

    match outcome {
        Ok(Ok(result)) => {
            info!(
                "Start {} returned {} after {}ms",
                resource_id,
                result.status(),
                result.processing_time_ms()
            );
            shared.transition(resource_id, generation, |item| {
                item.apply_start_result(&result)
            });
            return;
        }
        Ok(Err(OrchestratorError::Validation(e))) => {
            warn!("Start {} rejected: {}", resource_id, e);
            let reason = e.to_string();
            shared.transition(resource_id, generation, |item| item.reject(&reason));
            return;
        }
        Ok(Err(e)) => {
            call_token.cancel();
            info!(
                "Start {} failed in transit ({}); falling back to polling",
                resource_id, e
            );
        }
        Err(_) => {
            call_token.cancel();
            info!(
                "Start {} exceeded {:?}; falling back to polling",
                resource_id, abort_timeout
            );
        }
    }

    if shared.transition(resource_id, generation, ClientItem::enter_polling) {
        poll_availability(&shared, resource_id, generation).await;
    }
}

type CheckFuture<'a> =
    Pin<Box<dyn Future<Output = OrchestratorResult<AvailabilityResult>> + Send + 'a>>;

/// Resolve the outstanding check, or never when there is none
async fn outstanding(
    check: &mut Option<CheckFuture<'_>>,
) -> OrchestratorResult<AvailabilityResult> {
    match check {
        Some(check) => check.await,
        None => std::future::pending().await,
    }
}

/// Check availability at a fixed interval until found or the cap is reached
///
/// Every tick counts toward the cap. A tick that fires while a check is still
/// outstanding is skipped and the outstanding check is left to finish, so at
/// most one check per id is in flight and a slow check can still observe the
/// object. The loop ends no later than one interval after the last counted
/// tick.
async fn poll_availability(shared: &Shared, resource_id: ResourceId, generation: u64) {
    let period = shared.config.poll_interval;
    let max_polls = shared.config.max_poll_attempts;

    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut polls = 0;
    let mut in_flight: Option<CheckFuture<'_>> = None;

    loop {
        tokio::select! {
            biased;
            outcome = outstanding(&mut in_flight), if in_flight.is_some() => {
                in_flight = None;
                match outcome {
                    Ok(availability) if availability.available => {
                        info!(
                            "{} became available after {} poll(s)",
                            resource_id, polls
                        );
                        shared.transition(resource_id, generation, |item| {
                            item.record_poll(polls, max_polls);
                            item.mark_available(&availability);
                        });
                        return;
                    }
                    Ok(_) => {
                        debug!("{} not available yet ({}/{})", resource_id, polls, max_polls);
                    }
                    Err(e) => {
                        debug!(
                            "Check {} failed ({}/{}): {}",
                            resource_id, polls, max_polls, e
                        );
                    }
                }

                if !shared.transition(resource_id, generation, |item| {
                    item.record_poll(polls, max_polls)
                }) {
                    return;
                }
                if polls >= max_polls {
                    break;
                }
            }
            _ = ticker.tick() => {
                if polls >= max_polls {
                    debug!("Check {} still outstanding at the polling deadline", resource_id);
                    break;
                }
                polls += 1;

                if in_flight.is_some() {
                    debug!(
                        "Check {} still outstanding; poll {}/{} skipped",
                        resource_id, polls, max_polls
                    );
                    if !shared.transition(resource_id, generation, |item| {
                        item.record_poll(polls, max_polls)
                    }) {
                        return;
                    }
                } else {
                    in_flight = Some(shared.service.check(resource_id));
                }
            }
        }
    }

    warn!(
        "Gave up waiting for {} after {} polls",
        resource_id, max_polls
    );
    shared.transition(resource_id, generation, ClientItem::exhaust);
}
