//! Client-side item state and events

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::models::{AvailabilityResult, ResourceId, StartResult};
use crate::constants::progress;

/// User-facing messages for controller-generated states
pub mod messages {
    pub const IDLE: &str = "Waiting to start";
    pub const STARTING: &str = "Preparing download";
    pub const POLLING: &str = "Still processing, checking availability periodically";
    pub const AVAILABLE: &str = "File is now available";
    pub const EXHAUSTED: &str = "Timed out waiting for availability";
    pub const REJECTED: &str = "Request rejected";
    pub const CANCELLED: &str = "Cancelled before completion";
}

/// State of a tracked item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    /// Tracked, no attempt made yet
    Idle,
    /// Direct start call in flight
    Starting,
    /// Start abandoned; waiting for availability
    Polling,
    /// Start returned a completed result
    Completed,
    /// Start returned a failed result, polling was exhausted, or the
    /// controller shut down mid-attempt
    Failed,
    /// Polling observed the object
    Available,
}

impl ItemState {
    /// No automatic transition will leave this state
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ItemState::Completed | ItemState::Failed | ItemState::Available
        )
    }

    /// A start call or polling loop belongs to this state
    pub fn is_in_flight(self) -> bool {
        matches!(self, ItemState::Starting | ItemState::Polling)
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ItemState::Idle => "idle",
            ItemState::Starting => "starting",
            ItemState::Polling => "polling",
            ItemState::Completed => "completed",
            ItemState::Failed => "failed",
            ItemState::Available => "available",
        };
        f.write_str(label)
    }
}

/// Client-side view of one requested resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientItem {
    pub resource_id: ResourceId,
    pub state: ItemState,
    /// Manual retries performed so far
    pub attempts: u32,
    /// 0..=100
    pub progress: u8,
    pub last_message: String,
    pub download_reference: Option<String>,
    pub size: Option<u64>,
    /// Availability checks performed in the current polling phase
    pub polls: u32,
    pub updated_at: DateTime<Utc>,
}

impl ClientItem {
    pub fn new(resource_id: ResourceId) -> Self {
        Self {
            resource_id,
            state: ItemState::Idle,
            attempts: 0,
            progress: 0,
            last_message: messages::IDLE.to_string(),
            download_reference: None,
            size: None,
            polls: 0,
            updated_at: Utc::now(),
        }
    }

    /// Whether a manual retry is currently allowed
    pub fn can_retry(&self, max_attempts: u32) -> bool {
        self.state.is_terminal() && self.attempts < max_attempts
    }

    pub(crate) fn begin_attempt(&mut self) {
        self.state = ItemState::Starting;
        self.progress = progress::STARTING;
        self.download_reference = None;
        self.size = None;
        self.polls = 0;
        self.set_message(messages::STARTING);
    }

    pub(crate) fn apply_start_result(&mut self, result: &StartResult) {
        if result.is_completed() {
            self.state = ItemState::Completed;
            self.progress = progress::DONE;
            self.download_reference = result.download_reference().map(str::to_string);
            self.size = result.size();
        } else {
            self.state = ItemState::Failed;
            self.progress = 0;
        }
        self.set_message(result.message());
    }

    pub(crate) fn reject(&mut self, reason: &str) {
        self.state = ItemState::Failed;
        self.progress = 0;
        self.set_message(&format!("{}: {}", messages::REJECTED, reason));
    }

    pub(crate) fn enter_polling(&mut self) {
        self.state = ItemState::Polling;
        self.polls = 0;
        self.set_message(messages::POLLING);
    }

    pub(crate) fn record_poll(&mut self, polls: u32, max_polls: u32) {
        self.polls = polls;
        let span = u32::from(progress::POLLING_SPAN);
        let advanced = span * polls.min(max_polls) / max_polls.max(1);
        // advanced <= POLLING_SPAN, which fits in u8
        self.progress = progress::STARTING + advanced as u8;
        self.updated_at = Utc::now();
    }

    pub(crate) fn mark_available(&mut self, availability: &AvailabilityResult) {
        self.state = ItemState::Available;
        self.progress = progress::DONE;
        self.download_reference = availability.key.clone();
        self.size = availability.size;
        self.set_message(messages::AVAILABLE);
    }

    pub(crate) fn exhaust(&mut self) {
        self.state = ItemState::Failed;
        self.progress = 0;
        self.set_message(messages::EXHAUSTED);
    }

    pub(crate) fn cancel(&mut self) {
        self.state = ItemState::Failed;
        self.progress = 0;
        self.set_message(messages::CANCELLED);
    }

    fn set_message(&mut self, message: &str) {
        self.last_message = message.to_string();
        self.updated_at = Utc::now();
    }
}

/// Broadcast on every item change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemEvent {
    pub resource_id: ResourceId,
    pub state: ItemState,
    pub progress: u8,
    pub attempts: u32,
    pub message: String,
    /// The item stopped being tracked
    pub removed: bool,
}

impl From<&ClientItem> for ItemEvent {
    fn from(item: &ClientItem) -> Self {
        Self {
            resource_id: item.resource_id,
            state: item.state,
            progress: item.progress,
            attempts: item.attempts,
            message: item.last_message.clone(),
            removed: false,
        }
    }
}
