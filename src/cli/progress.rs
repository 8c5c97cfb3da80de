//! Progress display for tracked items
//!
//! One indicatif bar per resource id, updated from the controller's
//! [`ItemEvent`] stream. With bars disabled every event is printed as a
//! single line instead.

use std::collections::HashMap;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::debug;

use crate::app::{ItemEvent, ItemState, ResourceId};
use crate::errors::{AppError, Result};

/// Multi-bar display keyed by resource id
pub struct TrackProgress {
    multi: MultiProgress,
    bars: HashMap<ResourceId, ProgressBar>,
    enabled: bool,
}

impl TrackProgress {
    /// Create one bar per id; `enabled = false` switches to line output
    pub fn new(ids: &[ResourceId], enabled: bool) -> Result<Self> {
        let multi = if enabled {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        let style = ProgressStyle::default_bar()
            .template("{prefix:>10} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
            .map_err(|e| AppError::generic(format!("Progress bar template error: {}", e)))?
            .progress_chars("##-");

        let bars = ids
            .iter()
            .map(|&id| {
                let bar = multi.add(ProgressBar::new(100));
                bar.set_style(style.clone());
                bar.set_prefix(id.to_string());
                bar.set_message(ItemState::Idle.to_string());
                (id, bar)
            })
            .collect();

        Ok(Self {
            multi,
            bars,
            enabled,
        })
    }

    /// Reflect one event
    pub fn apply(&self, event: &ItemEvent) {
        let Some(bar) = self.bars.get(&event.resource_id) else {
            debug!("No progress bar for {}", event.resource_id);
            return;
        };

        bar.set_position(u64::from(event.progress));
        let message = render(event);
        if self.enabled {
            bar.set_message(message);
        } else {
            println!("{:>10} {:>3}% {}", event.resource_id, event.progress, message);
        }
    }

    /// Position of the bar for `id`, if any
    pub fn position(&self, id: ResourceId) -> Option<u64> {
        self.bars.get(&id).map(ProgressBar::position)
    }

    /// Leave every bar on screen with its last message
    pub fn finish(&self) {
        for bar in self.bars.values() {
            bar.abandon();
        }
        if let Err(e) = self.multi.clear() {
            debug!("Could not clear progress display: {}", e);
        }
    }
}

fn render(event: &ItemEvent) -> String {
    if event.removed {
        return "removed".to_string();
    }
    if event.attempts > 0 {
        format!("{} (retry {}): {}", event.state, event.attempts, event.message)
    } else {
        format!("{}: {}", event.state, event.message)
    }
}
