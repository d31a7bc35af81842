//! # Function-backed worker (`WorkerFn`)
//!
//! [`WorkerFn`] wraps a closure `F: Fn(CancellationToken) -> Fut`,
//! producing a fresh future per occurrence. Each call creates a new
//! future owning its own state; shared state between occurrences goes
//! through an explicit `Arc` inside the closure.
//!
//! This is the construction path for the concrete worker kinds, whose
//! bodies are external collaborators.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use upkeep::{ScheduleRule, Worker, WorkerError, WorkerFn, WorkerKind, WorkerRef};
//!
//! let w: WorkerRef = WorkerFn::arc(
//!     "checkin/site-a",
//!     WorkerKind::CheckIn,
//!     ScheduleRule::IntervalDays { days: 1 },
//!     |_token: CancellationToken| async move {
//!         // perform the check-in...
//!         Ok::<_, WorkerError>(())
//!     },
//! );
//! assert_eq!(w.name(), "checkin/site-a");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;
use crate::schedule::ScheduleRule;
use crate::workers::worker::{Worker, WorkerKind};

/// Function-backed worker implementation.
pub struct WorkerFn<F> {
    name: Cow<'static, str>,
    kind: WorkerKind,
    rule: ScheduleRule,
    f: F,
}

impl<F> WorkerFn<F> {
    /// Creates a new function-backed worker.
    ///
    /// Prefer [`WorkerFn::arc`] when you immediately need a [`WorkerRef`](crate::WorkerRef).
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        kind: WorkerKind,
        rule: ScheduleRule,
        f: F,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            rule,
            f,
        }
    }

    /// Creates the worker and returns it as a shared handle.
    pub fn arc(
        name: impl Into<Cow<'static, str>>,
        kind: WorkerKind,
        rule: ScheduleRule,
        f: F,
    ) -> Arc<Self> {
        Arc::new(Self::new(name, kind, rule, f))
    }
}

#[async_trait]
impl<F, Fut> Worker for WorkerFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), WorkerError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> WorkerKind {
        self.kind
    }

    fn schedule_rule(&self) -> ScheduleRule {
        self.rule
    }

    async fn run_once(&self, token: CancellationToken) -> Result<(), WorkerError> {
        (self.f)(token).await
    }
}
