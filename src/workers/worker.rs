//! # Worker abstraction.
//!
//! A [`Worker`] is one recurring account-maintenance unit: a site
//! check-in, a keep-alive ping, a chat monitor, or a message poster. The
//! engine only sees the contract; the bodies talk to remote services and
//! live outside this crate.
//!
//! ## Contract obligations
//! - `run_once` is idempotent: safe to call repeatedly, including the
//!   extra occurrence of the instant startup phase.
//! - `run_once` observes its token at every suspension point and unwinds
//!   promptly with [`WorkerError::Cancelled`] — a worker that never looks
//!   at its token will never stop, and the engine does not enforce a
//!   timeout around it.
//! - `schedule_rule` is queried once per scheduling-loop iteration and
//!   may change between iterations.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;
use crate::schedule::ScheduleRule;

/// Closed set of worker kinds.
///
/// The set of kinds is fixed here; which instances exist and which kinds
/// are enabled is configuration-driven.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkerKind {
    /// Daily site check-in.
    CheckIn,
    /// N-day keep-alive ping.
    KeepAlive,
    /// Chat monitoring.
    Monitor,
    /// Periodic message posting.
    Messager,
}

impl WorkerKind {
    /// All kinds, in manager start order.
    pub const ALL: [WorkerKind; 4] = [
        WorkerKind::CheckIn,
        WorkerKind::KeepAlive,
        WorkerKind::Monitor,
        WorkerKind::Messager,
    ];

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerKind::CheckIn => "checkin",
            WorkerKind::KeepAlive => "keepalive",
            WorkerKind::Monitor => "monitor",
            WorkerKind::Messager => "messager",
        }
    }

    /// Whether workers of this kind participate in the instant startup
    /// phase. Monitors and messagers are schedule-only.
    pub fn supports_instant(&self) -> bool {
        matches!(self, WorkerKind::CheckIn | WorkerKind::KeepAlive)
    }
}

/// # Asynchronous, cancellable maintenance unit.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use upkeep::{ScheduleRule, Worker, WorkerError, WorkerKind};
///
/// struct KeepAlive;
///
/// #[async_trait]
/// impl Worker for KeepAlive {
///     fn name(&self) -> &str { "keepalive/media-server" }
///     fn kind(&self) -> WorkerKind { WorkerKind::KeepAlive }
///     fn schedule_rule(&self) -> ScheduleRule {
///         ScheduleRule::IntervalDays { days: 3 }
///     }
///
///     async fn run_once(&self, token: CancellationToken) -> Result<(), WorkerError> {
///         if token.is_cancelled() {
///             return Err(WorkerError::Cancelled);
///         }
///         // ping the keep-alive endpoint...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Worker: Send + Sync + 'static {
    /// Returns a stable, human-readable worker name.
    fn name(&self) -> &str;

    /// Returns the worker's kind.
    fn kind(&self) -> WorkerKind;

    /// Returns the recurrence rule; queried once per loop iteration.
    fn schedule_rule(&self) -> ScheduleRule;

    /// Performs one occurrence of the worker's action.
    ///
    /// Must be idempotent and observe `token` promptly. An `Err` other
    /// than [`WorkerError::Cancelled`] ends the worker's scheduling loop;
    /// a worker that wants to survive a bad occurrence catches its own
    /// action errors and returns `Ok(())`.
    async fn run_once(&self, token: CancellationToken) -> Result<(), WorkerError>;
}

/// Shared handle to a worker.
pub type WorkerRef = Arc<dyn Worker>;
