//! # LogWriter — built-in event-to-log subscriber.
//!
//! Maps every runtime event to one `tracing` line. Terminal activity
//! events produce exactly one classifying line each (completed, failed,
//! cancelled); a fail-fast escalation produces the distinct "stopping"
//! line before draining begins.

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Built-in subscriber that renders events through `tracing`.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Constructs a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let error = e.error.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::PhaseEntered => {
                let phase = e.phase.map(|p| p.as_label()).unwrap_or("-");
                tracing::info!(phase, "entering phase");
            }
            EventKind::ActivityAdded => {
                tracing::debug!(task, "activity started");
            }
            EventKind::ActivityCompleted => {
                tracing::info!(task, "activity completed");
            }
            EventKind::ActivityFailed => {
                tracing::error!(task, error, "activity failed and exited");
            }
            EventKind::ActivityCancelled => {
                tracing::info!(task, "activity cancelled");
            }
            EventKind::TriggerScheduled => {
                let at = e
                    .scheduled_for
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "-".to_string());
                tracing::debug!(task, at, "next trigger scheduled");
            }
            EventKind::ShutdownRequested => {
                tracing::info!("shutdown requested");
            }
            EventKind::FatalStopping => {
                tracing::error!(task, error, "stopping: worker failure escalated");
            }
            EventKind::AllStoppedWithin => {
                tracing::debug!("all activities stopped within the grace window");
            }
            EventKind::GraceExceeded => {
                tracing::warn!(stuck = error, "grace window exceeded");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(subscriber = task, reason = error, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(subscriber = task, info = error, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
