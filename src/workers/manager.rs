//! # Manager: batch operations over workers of one kind.
//!
//! A [`Manager`] groups the workers of a single [`WorkerKind`] and offers
//! the two operations the orchestrator drives:
//!
//! - [`Manager::run_all`] — one occurrence per worker, all concurrent,
//!   blocking until **this batch** (and only this batch) finishes; used
//!   by the instant startup phase.
//! - [`Manager::schedule_all`] — non-blocking; registers one perpetual
//!   scheduling activity per worker into the shared pool.
//!
//! ## Scheduling loop
//! ```text
//! loop {
//!   ├─► rule = timing.apply(worker.schedule_rule())   (re-queried each turn)
//!   ├─► at = rule.next_trigger(now, previous)
//!   ├─► publish TriggerScheduled { task, at }
//!   ├─► sleep_until(at)          ── cancelled? ──► Err(Cancelled), loop ends
//!   ├─► worker.run_once(token)   ── Err?       ──► loop ends, activity fails
//!   └─► previous = at
//! }
//! ```
//!
//! The loop is the worker's terminal condition: it ends only through
//! cancellation or an uncaught action error. The manager itself holds no
//! scheduling state — `previous` lives inside each loop.

use std::sync::Arc;

use chrono::Local;

use crate::config::FirstRun;
use crate::core::{ContextRegistry, RunContext, TaskPool};
use crate::error::{PoolError, WorkerError};
use crate::events::{Bus, Event, EventKind};
use crate::schedule::{sleep_until, Timing};
use crate::workers::worker::{WorkerKind, WorkerRef};

/// Ordered collection of workers of one kind.
pub struct Manager {
    kind: WorkerKind,
    workers: Vec<WorkerRef>,
}

impl Manager {
    /// Creates an empty manager for the given kind.
    pub fn new(kind: WorkerKind) -> Self {
        Self {
            kind,
            workers: Vec::new(),
        }
    }

    /// Adds a worker (builder style).
    pub fn with_worker(mut self, worker: WorkerRef) -> Self {
        self.push(worker);
        self
    }

    /// Adds a worker.
    pub fn push(&mut self, worker: WorkerRef) {
        debug_assert_eq!(worker.kind(), self.kind, "worker kind mismatch");
        self.workers.push(worker);
    }

    /// Returns the manager's kind.
    pub fn kind(&self) -> WorkerKind {
        self.kind
    }

    /// Number of workers in the group.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// True when the group is empty.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Runs one occurrence of every worker's action concurrently and
    /// blocks until all of **this batch** have finished.
    ///
    /// Failures are not raised here: they surface through the pool's
    /// completion stream like any other terminal activity. `instant`
    /// marks the batch as the instant startup phase in activity names.
    pub async fn run_all(
        &self,
        pool: &TaskPool,
        contexts: &Arc<ContextRegistry>,
        instant: bool,
    ) -> Result<(), PoolError> {
        let mut batch = Vec::with_capacity(self.workers.len());
        for worker in &self.workers {
            let name = if instant {
                format!("{}/instant", worker.name())
            } else {
                worker.name().to_string()
            };
            let ctx = contexts.create(None);
            let worker = Arc::clone(worker);
            let handle = pool.add(name, async move {
                worker.run_once(ctx.token().child_token()).await
            })?;
            batch.push(handle);
        }
        for handle in &batch {
            handle.finished().await;
        }
        Ok(())
    }

    /// Registers one perpetual scheduling activity per worker.
    ///
    /// Non-blocking: the loops run inside the pool and end only via
    /// cancellation or an uncaught action error.
    pub fn schedule_all(
        &self,
        pool: &TaskPool,
        contexts: &Arc<ContextRegistry>,
        timing: Timing,
        first_run: FirstRun,
        bus: &Bus,
    ) -> Result<(), PoolError> {
        for worker in &self.workers {
            let ctx = contexts.create(None);
            let worker = Arc::clone(worker);
            let bus = bus.clone();
            pool.add(
                worker.name().to_string(),
                run_on_schedule(worker, ctx, timing, first_run, bus),
            )?;
        }
        Ok(())
    }
}

/// One worker's perpetual scheduling loop.
async fn run_on_schedule(
    worker: WorkerRef,
    ctx: RunContext,
    timing: Timing,
    first_run: FirstRun,
    bus: Bus,
) -> Result<(), WorkerError> {
    let mut previous = match first_run {
        FirstRun::Immediate => None,
        // Seeding a synthetic previous trigger makes interval rules wait
        // one full interval before the first fire.
        FirstRun::AfterInterval => Some(Local::now().naive_local()),
    };

    loop {
        let rule = timing.apply(worker.schedule_rule());
        let now = Local::now().naive_local();
        let at = rule.next_trigger(now, previous);

        bus.publish(
            Event::now(EventKind::TriggerScheduled)
                .with_task(worker.name())
                .with_scheduled_for(at),
        );

        sleep_until(at, ctx.token()).await?;
        worker.run_once(ctx.token().child_token()).await?;
        previous = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::{sleep, timeout};
    use tokio_util::sync::CancellationToken;

    use crate::core::ActivityStatus;
    use crate::schedule::ScheduleRule;
    use crate::workers::worker_fn::WorkerFn;

    fn immediate(ms: u64) -> ScheduleRule {
        ScheduleRule::Immediate {
            delay: Duration::from_millis(ms),
        }
    }

    fn counting_worker(
        name: &'static str,
        kind: WorkerKind,
        rule: ScheduleRule,
        counter: Arc<AtomicU32>,
        delay: Duration,
    ) -> WorkerRef {
        WorkerFn::arc(name, kind, rule, move |_token: CancellationToken| {
            let counter = Arc::clone(&counter);
            async move {
                sleep(delay).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, WorkerError>(())
            }
        })
    }

    #[tokio::test]
    async fn test_run_all_blocks_until_the_slowest_worker() {
        let bus = Bus::new(64);
        let pool = TaskPool::new(bus.clone());
        let contexts = ContextRegistry::new();

        let fast = Arc::new(AtomicU32::new(0));
        let slow = Arc::new(AtomicU32::new(0));
        let manager = Manager::new(WorkerKind::CheckIn)
            .with_worker(counting_worker(
                "checkin/fast",
                WorkerKind::CheckIn,
                immediate(10),
                Arc::clone(&fast),
                Duration::from_millis(10),
            ))
            .with_worker(counting_worker(
                "checkin/slow",
                WorkerKind::CheckIn,
                immediate(10),
                Arc::clone(&slow),
                Duration::from_millis(150),
            ));

        let started = std::time::Instant::now();
        manager.run_all(&pool, &contexts, true).await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(150));
        assert_eq!(fast.load(Ordering::SeqCst), 1);
        assert_eq!(slow.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_all_instant_marks_activity_names() {
        let bus = Bus::new(64);
        let pool = TaskPool::new(bus.clone());
        let contexts = ContextRegistry::new();

        let counter = Arc::new(AtomicU32::new(0));
        let manager = Manager::new(WorkerKind::KeepAlive).with_worker(counting_worker(
            "keepalive/server",
            WorkerKind::KeepAlive,
            immediate(10),
            counter,
            Duration::ZERO,
        ));

        manager.run_all(&pool, &contexts, true).await.unwrap();
        pool.close();

        let mut stream = pool.as_completed();
        let done = stream.next().await.unwrap();
        assert_eq!(&*done.name, "keepalive/server/instant");
    }

    #[tokio::test]
    async fn test_scheduled_loop_keeps_firing_until_cancelled() {
        let bus = Bus::new(64);
        let pool = TaskPool::new(bus.clone());
        let contexts = ContextRegistry::new();

        let counter = Arc::new(AtomicU32::new(0));
        let manager = Manager::new(WorkerKind::Messager).with_worker(counting_worker(
            "messager/lounge",
            WorkerKind::Messager,
            ScheduleRule::IntervalDays { days: 30 },
            Arc::clone(&counter),
            Duration::ZERO,
        ));

        // Compressed timing turns the 30-day interval into 20ms fires.
        manager
            .schedule_all(
                &pool,
                &contexts,
                Timing::Compressed {
                    delay: Duration::from_millis(20),
                },
                FirstRun::AfterInterval,
                &bus,
            )
            .unwrap();

        sleep(Duration::from_millis(300)).await;
        assert!(counter.load(Ordering::SeqCst) >= 2);

        contexts.cancel_all();
        let mut stream = pool.as_completed();
        let done = timeout(Duration::from_secs(5), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&*done.name, "messager/lounge");
        assert!(matches!(done.status, ActivityStatus::Cancelled));
    }

    #[tokio::test]
    async fn test_scheduled_loop_ends_on_uncaught_action_error() {
        let bus = Bus::new(64);
        let pool = TaskPool::new(bus.clone());
        let contexts = ContextRegistry::new();

        let calls = Arc::new(AtomicU32::new(0));
        let calls_inner = Arc::clone(&calls);
        let failing: WorkerRef = WorkerFn::arc(
            "monitor/group",
            WorkerKind::Monitor,
            immediate(10),
            move |_token: CancellationToken| {
                let calls = Arc::clone(&calls_inner);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Ok(())
                    } else {
                        Err(WorkerError::action("flood wait"))
                    }
                }
            },
        );

        let manager = Manager::new(WorkerKind::Monitor).with_worker(failing);
        manager
            .schedule_all(
                &pool,
                &contexts,
                Timing::Real,
                FirstRun::Immediate,
                &bus,
            )
            .unwrap();

        let mut stream = pool.as_completed();
        let done = timeout(Duration::from_secs(5), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(done.status, ActivityStatus::Failed(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // The loop's run context deregistered itself on exit.
        assert!(contexts.is_empty());
    }

    #[tokio::test]
    async fn test_first_run_policy_gates_the_initial_interval_fire() {
        let bus = Bus::new(64);
        let pool = TaskPool::new(bus.clone());
        let contexts = ContextRegistry::new();

        let eager = Arc::new(AtomicU32::new(0));
        let patient = Arc::new(AtomicU32::new(0));
        let rule = ScheduleRule::IntervalDays { days: 1 };

        Manager::new(WorkerKind::KeepAlive)
            .with_worker(counting_worker(
                "keepalive/eager",
                WorkerKind::KeepAlive,
                rule,
                Arc::clone(&eager),
                Duration::ZERO,
            ))
            .schedule_all(&pool, &contexts, Timing::Real, FirstRun::Immediate, &bus)
            .unwrap();

        Manager::new(WorkerKind::KeepAlive)
            .with_worker(counting_worker(
                "keepalive/patient",
                WorkerKind::KeepAlive,
                rule,
                Arc::clone(&patient),
                Duration::ZERO,
            ))
            .schedule_all(&pool, &contexts, Timing::Real, FirstRun::AfterInterval, &bus)
            .unwrap();

        sleep(Duration::from_millis(200)).await;
        // Immediate fired its first occurrence at once; AfterInterval is
        // a full day away.
        assert_eq!(eager.load(Ordering::SeqCst), 1);
        assert_eq!(patient.load(Ordering::SeqCst), 0);

        contexts.cancel_all();
    }

    #[tokio::test]
    async fn test_trigger_scheduled_events_are_published() {
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let pool = TaskPool::new(bus.clone());
        let contexts = ContextRegistry::new();

        let counter = Arc::new(AtomicU32::new(0));
        Manager::new(WorkerKind::CheckIn)
            .with_worker(counting_worker(
                "checkin/site",
                WorkerKind::CheckIn,
                immediate(10),
                counter,
                Duration::ZERO,
            ))
            .schedule_all(&pool, &contexts, Timing::Real, FirstRun::Immediate, &bus)
            .unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let ev = timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
            if let Ok(ev) = ev {
                if ev.kind == EventKind::TriggerScheduled {
                    assert_eq!(ev.task.as_deref(), Some("checkin/site"));
                    assert!(ev.scheduled_for.is_some());
                    break;
                }
            }
            assert!(tokio::time::Instant::now() < deadline, "no trigger event");
        }

        contexts.cancel_all();
    }
}
