//! # Runtime events emitted by the pool, managers, and orchestrator.
//!
//! The [`EventKind`] enum classifies events across four categories:
//! - **Phase events**: orchestrator state-machine transitions.
//! - **Activity events**: pool registrations and terminal statuses.
//! - **Schedule events**: computed trigger instants.
//! - **Shutdown events**: signal, fatal escalation, drain outcome.
//!
//! The [`Event`] struct carries optional metadata such as the activity
//! name, error text, and the scheduled trigger instant.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically; use it to restore order when events are observed through
//! independently-buffered subscribers.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::NaiveDateTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Orchestrator lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Building managers and wiring subscribers.
    Init,
    /// Running instant-capable workers once before scheduling.
    Instant,
    /// Scheduled operation: consuming the completion stream.
    Scheduled,
    /// Joining notification streams and cancelling all contexts.
    Draining,
    /// Run finished; the process decides the exit code.
    Terminated,
}

impl Phase {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Instant => "instant",
            Phase::Scheduled => "scheduled",
            Phase::Draining => "draining",
            Phase::Terminated => "terminated",
        }
    }
}

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Phase events ===
    /// The orchestrator entered a new lifecycle phase.
    ///
    /// Sets: `phase`.
    PhaseEntered,

    // === Activity events ===
    /// An activity was registered with the pool and started running.
    ///
    /// Sets: `task`.
    ActivityAdded,

    /// An activity finished successfully.
    ///
    /// Sets: `task`.
    ActivityCompleted,

    /// An activity failed (action error or captured panic).
    ///
    /// Sets: `task`, `error`.
    ActivityFailed,

    /// An activity was cancelled (handle cancel or run-context unwind).
    ///
    /// Sets: `task`.
    ActivityCancelled,

    // === Schedule events ===
    /// A scheduling loop computed its next trigger instant.
    ///
    /// Sets: `task`, `scheduled_for`.
    TriggerScheduled,

    // === Shutdown events ===
    /// An OS termination signal was observed.
    ShutdownRequested,

    /// A worker failure escalated under fail-fast; the run is stopping.
    ///
    /// Sets: `task`, `error`.
    FatalStopping,

    /// Every outstanding activity stopped within the grace window.
    AllStoppedWithin,

    /// The grace window elapsed with activities still running.
    ///
    /// Sets: `error` (comma-joined names of the stuck activities).
    GraceExceeded,

    // === Subscriber faults ===
    /// A subscriber's queue was full or closed; the event was dropped
    /// for that subscriber only.
    ///
    /// Sets: `task` (subscriber name), `error` (reason).
    SubscriberOverflow,

    /// A subscriber panicked while processing an event.
    ///
    /// Sets: `task` (subscriber name), `error` (panic info).
    SubscriberPanicked,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the activity or subscriber, if applicable.
    pub task: Option<Arc<str>>,
    /// Human-readable error or reason text.
    pub error: Option<Arc<str>>,
    /// Computed trigger instant (schedule events).
    pub scheduled_for: Option<NaiveDateTime>,
    /// Lifecycle phase (phase events).
    pub phase: Option<Phase>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp
    /// and the next global sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            error: None,
            scheduled_for: None,
            phase: None,
        }
    }

    /// Attaches an activity or subscriber name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a human-readable error or reason.
    #[inline]
    pub fn with_error(mut self, error: impl Into<Arc<str>>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attaches a computed trigger instant.
    #[inline]
    pub fn with_scheduled_for(mut self, at: NaiveDateTime) -> Self {
        self.scheduled_for = Some(at);
        self
    }

    /// Attaches a lifecycle phase.
    #[inline]
    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::now(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_error(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::now(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_error(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::now(EventKind::ActivityAdded);
        let b = Event::now(EventKind::ActivityCompleted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_builder_fields() {
        let ev = Event::now(EventKind::ActivityFailed)
            .with_task("checkin/site-a")
            .with_error("connection refused");
        assert_eq!(ev.task.as_deref(), Some("checkin/site-a"));
        assert_eq!(ev.error.as_deref(), Some("connection refused"));
        assert!(ev.phase.is_none());
    }
}
