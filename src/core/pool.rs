//! # TaskPool: named, observable collection of in-flight activities.
//!
//! The pool is the concurrency core of the engine. It is the sole owner
//! of every activity added to it: it starts the activity, captures its
//! terminal status (success, failure, captured panic, cancellation), and
//! surfaces that status **exactly once** through the completion stream.
//!
//! ## Architecture
//! ```text
//! add(name, future) ──► tokio::spawn(wrapper)
//!                            │
//!                            ├─ future resolves Ok(())            → Completed
//!                            ├─ future resolves Err(Cancelled)    → Cancelled
//!                            ├─ future resolves Err(e)            → Failed(e)
//!                            ├─ future panics (catch_unwind)      → Failed(Panicked)
//!                            └─ handle.cancel()                   → Cancelled
//!                            │
//!                            ▼
//!                  completion channel ──► as_completed() consumer
//!                  (one Completion per activity, completion order)
//! ```
//!
//! ## Rules
//! - Every added activity is observed exactly once through
//!   [`TaskPool::as_completed`], failures and cancellations included.
//! - [`TaskPool::wait`] is a join barrier over exactly the activities
//!   registered before the call; later additions are unaffected.
//! - The completion stream stays open until [`TaskPool::close`] and then
//!   drains in-flight work before ending; it is not restartable.
//! - Activity failures are captured, never propagated out of the pool;
//!   the stream consumer decides whether to escalate.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::error::{PoolError, WorkerError};
use crate::events::{Bus, Event, EventKind};

/// Terminal status of one activity.
#[derive(Debug)]
pub enum ActivityStatus {
    /// The activity's future resolved successfully.
    Completed,
    /// The activity failed: action error or captured panic.
    Failed(WorkerError),
    /// The activity was cancelled (handle or run-context unwind).
    Cancelled,
}

impl ActivityStatus {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ActivityStatus::Completed => "completed",
            ActivityStatus::Failed(_) => "failed",
            ActivityStatus::Cancelled => "cancelled",
        }
    }
}

/// One observed terminal activity: its assigned name plus status.
#[derive(Debug)]
pub struct Completion {
    /// Name assigned at [`TaskPool::add`] (not necessarily unique).
    pub name: Arc<str>,
    /// Terminal status.
    pub status: ActivityStatus,
}

/// Handle returned by [`TaskPool::add`], usable for cancellation and for
/// awaiting this one activity.
#[derive(Debug)]
pub struct ActivityHandle {
    name: Arc<str>,
    cancel: CancellationToken,
    done: watch::Receiver<bool>,
}

impl ActivityHandle {
    /// Returns the activity's assigned name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cancels the activity; it will surface once as `Cancelled`.
    ///
    /// Idempotent; a no-op once the activity already reached a terminal
    /// status.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Awaits this activity reaching a terminal status.
    pub async fn finished(&self) {
        let mut done = self.done.clone();
        let _ = done.wait_for(|finished| *finished).await;
    }
}

/// Single-consumer sequence of completions in completion order.
///
/// Obtained from [`TaskPool::as_completed`]. `next()` pends while the
/// pool is open with nothing terminal yet, and returns `None` once the
/// pool has been closed and drained — or immediately, when the stream
/// was already taken by an earlier `as_completed()` call.
pub struct CompletionStream {
    rx: Option<mpsc::UnboundedReceiver<Completion>>,
}

impl CompletionStream {
    /// Yields the next terminal activity.
    pub async fn next(&mut self) -> Option<Completion> {
        match self.rx.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }
}

/// Registered activity bookkeeping.
struct Entry {
    name: Arc<str>,
    done: watch::Receiver<bool>,
}

struct PoolInner {
    entries: Mutex<HashMap<u64, Entry>>,
    next_id: AtomicU64,
    /// Prototype completion sender; cloned per activity, dropped by `close()`.
    done_tx: Mutex<Option<mpsc::UnboundedSender<Completion>>>,
    done_rx: Mutex<Option<mpsc::UnboundedReceiver<Completion>>>,
    bus: Bus,
}

/// Named, observable pool of concurrently running activities.
///
/// Cheap to clone; clones share the same pool.
#[derive(Clone)]
pub struct TaskPool {
    inner: Arc<PoolInner>,
}

/// Recovers the guard from a poisoned lock; the pool's critical sections
/// never panic while holding it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TaskPool {
    /// Creates an empty pool publishing activity events to `bus`.
    pub fn new(bus: Bus) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(PoolInner {
                entries: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                done_tx: Mutex::new(Some(tx)),
                done_rx: Mutex::new(Some(rx)),
                bus,
            }),
        }
    }

    /// Registers an activity and starts it immediately.
    ///
    /// `name` may repeat across activities; it is a reporting label, not
    /// a key. Returns [`PoolError::Closed`] after [`TaskPool::close`].
    pub fn add<F>(
        &self,
        name: impl Into<Arc<str>>,
        activity: F,
    ) -> Result<ActivityHandle, PoolError>
    where
        F: Future<Output = Result<(), WorkerError>> + Send + 'static,
    {
        let name: Arc<str> = name.into();
        let tx = match &*lock(&self.inner.done_tx) {
            Some(tx) => tx.clone(),
            None => return Err(PoolError::Closed),
        };

        let id = self.inner.next_id.fetch_add(1, AtomicOrdering::Relaxed);
        let cancel = CancellationToken::new();
        let (done_set, done) = watch::channel(false);

        lock(&self.inner.entries).insert(
            id,
            Entry {
                name: name.clone(),
                done: done.clone(),
            },
        );
        self.inner
            .bus
            .publish(Event::now(EventKind::ActivityAdded).with_task(name.clone()));

        let inner = Arc::clone(&self.inner);
        let task_name = name.clone();
        let token = cancel.clone();
        tokio::spawn(async move {
            let status = run_activity(activity, &token).await;
            inner.finish(id, task_name, status, tx, done_set);
        });

        Ok(ActivityHandle { name, cancel, done })
    }

    /// Join barrier: suspends until every activity registered **before**
    /// this call reaches a terminal status.
    ///
    /// Returns immediately when nothing is registered. Never raises on
    /// activity failure — failures are reported through the stream.
    pub async fn wait(&self) {
        let pending: Vec<watch::Receiver<bool>> = lock(&self.inner.entries)
            .values()
            .map(|e| e.done.clone())
            .collect();
        for mut done in pending {
            let _ = done.wait_for(|finished| *finished).await;
        }
    }

    /// Takes the completion stream.
    ///
    /// The stream is single-consumer and not restartable: the first call
    /// takes it, any later call returns an already-exhausted stream.
    pub fn as_completed(&self) -> CompletionStream {
        CompletionStream {
            rx: lock(&self.inner.done_rx).take(),
        }
    }

    /// Closes the pool: further [`TaskPool::add`] calls are rejected and
    /// the completion stream ends once in-flight activities drain.
    pub fn close(&self) {
        lock(&self.inner.done_tx).take();
    }

    /// True once [`TaskPool::close`] has been called.
    pub fn is_closed(&self) -> bool {
        lock(&self.inner.done_tx).is_none()
    }

    /// Sorted names of activities that have not reached a terminal
    /// status yet (stuck-activity reporting during draining).
    pub fn active_names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.inner.entries)
            .values()
            .map(|e| e.name.to_string())
            .collect();
        names.sort_unstable();
        names
    }
}

impl PoolInner {
    /// Records a terminal status: deregisters the entry, publishes the
    /// terminal event, pushes the completion, flips the done flag.
    fn finish(
        &self,
        id: u64,
        name: Arc<str>,
        status: ActivityStatus,
        tx: mpsc::UnboundedSender<Completion>,
        done_set: watch::Sender<bool>,
    ) {
        lock(&self.entries).remove(&id);

        let kind = match &status {
            ActivityStatus::Completed => EventKind::ActivityCompleted,
            ActivityStatus::Failed(_) => EventKind::ActivityFailed,
            ActivityStatus::Cancelled => EventKind::ActivityCancelled,
        };
        let mut ev = Event::now(kind).with_task(name.clone());
        if let ActivityStatus::Failed(e) = &status {
            ev = ev.with_error(e.to_string());
        }
        self.bus.publish(ev);

        let _ = tx.send(Completion { name, status });
        let _ = done_set.send(true);
    }
}

/// Drives one activity to its terminal status.
///
/// Panics are captured (`catch_unwind`) and classified as failures; an
/// `Err(Cancelled)` from the future is a cooperative unwind and
/// classified as `Cancelled`, the same way a handle cancellation is.
async fn run_activity<F>(activity: F, token: &CancellationToken) -> ActivityStatus
where
    F: Future<Output = Result<(), WorkerError>> + Send,
{
    let guarded = std::panic::AssertUnwindSafe(activity).catch_unwind();
    tokio::select! {
        _ = token.cancelled() => ActivityStatus::Cancelled,
        outcome = guarded => match outcome {
            Ok(Ok(())) => ActivityStatus::Completed,
            Ok(Err(e)) if e.is_cancelled() => ActivityStatus::Cancelled,
            Ok(Err(e)) => ActivityStatus::Failed(e),
            Err(panic) => ActivityStatus::Failed(WorkerError::Panicked {
                info: panic_info(&panic),
            }),
        }
    }
}

/// Renders a captured panic payload as text.
fn panic_info(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    fn pool() -> TaskPool {
        TaskPool::new(Bus::new(64))
    }

    async fn drain(pool: &TaskPool, expected: usize) -> Vec<Completion> {
        let mut stream = pool.as_completed();
        let mut out = Vec::new();
        for _ in 0..expected {
            let next = timeout(Duration::from_secs(5), stream.next())
                .await
                .expect("stream stalled");
            out.push(next.expect("stream ended early"));
        }
        out
    }

    #[tokio::test]
    async fn test_every_activity_observed_exactly_once() {
        let pool = pool();
        let mut added: Vec<String> = Vec::new();
        for name in ["a", "b", "b", "c", "d"] {
            pool.add(name, async { Ok(()) }).unwrap();
            added.push(name.to_string());
        }

        let mut seen: Vec<String> = drain(&pool, 5)
            .await
            .into_iter()
            .map(|c| c.name.to_string())
            .collect();
        seen.sort();
        added.sort();
        assert_eq!(seen, added);
    }

    #[tokio::test]
    async fn test_success_failure_and_cancel_statuses() {
        let pool = pool();
        pool.add("ok", async { Ok(()) }).unwrap();
        pool.add("bad", async { Err(WorkerError::action("boom")) })
            .unwrap();
        let stuck = pool
            .add("stuck", async {
                std::future::pending::<()>().await;
                Ok(())
            })
            .unwrap();
        stuck.cancel();

        let completions = drain(&pool, 3).await;
        for c in completions {
            match &*c.name {
                "ok" => assert!(matches!(c.status, ActivityStatus::Completed)),
                "bad" => assert!(matches!(c.status, ActivityStatus::Failed(_))),
                "stuck" => assert!(matches!(c.status, ActivityStatus::Cancelled)),
                other => panic!("unexpected activity {other}"),
            }
        }
    }

    #[tokio::test]
    async fn test_cancelled_error_classified_as_cancelled() {
        let pool = pool();
        pool.add("unwound", async { Err(WorkerError::Cancelled) })
            .unwrap();
        let c = drain(&pool, 1).await.remove(0);
        assert!(matches!(c.status, ActivityStatus::Cancelled));
    }

    #[tokio::test]
    async fn test_panic_is_captured_as_failure() {
        let pool = pool();
        pool.add("explodes", async {
            panic!("kaboom");
        })
        .unwrap();
        let c = drain(&pool, 1).await.remove(0);
        match c.status {
            ActivityStatus::Failed(WorkerError::Panicked { info }) => {
                assert!(info.contains("kaboom"));
            }
            other => panic!("expected captured panic, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_empty() {
        let pool = pool();
        timeout(Duration::from_millis(100), pool.wait())
            .await
            .expect("wait should not block on an empty pool");
    }

    #[tokio::test]
    async fn test_wait_blocks_until_slowest_registered_activity() {
        let pool = pool();
        pool.add("fast", async {
            sleep(Duration::from_millis(10)).await;
            Ok(())
        })
        .unwrap();
        pool.add("slow", async {
            sleep(Duration::from_millis(150)).await;
            Ok(())
        })
        .unwrap();

        let started = std::time::Instant::now();
        pool.wait().await;
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_wait_ignores_activities_added_afterwards() {
        let pool = pool();
        pool.add("quick", async { Ok(()) }).unwrap();
        pool.wait().await;

        // A never-finishing activity added after the barrier returned
        // must stall a *new* barrier, proving the first one did not
        // cover it retroactively.
        pool.add("pending", async {
            std::future::pending::<()>().await;
            Ok(())
        })
        .unwrap();
        assert!(timeout(Duration::from_millis(100), pool.wait())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_add_after_close_is_rejected() {
        let pool = pool();
        pool.close();
        let err = pool.add("late", async { Ok(()) }).unwrap_err();
        assert_eq!(err, PoolError::Closed);
        assert!(pool.is_closed());
    }

    #[tokio::test]
    async fn test_stream_ends_after_close_and_drain() {
        let pool = pool();
        pool.add("only", async { Ok(()) }).unwrap();
        pool.close();

        let mut stream = pool.as_completed();
        assert!(stream.next().await.is_some());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_is_not_restartable() {
        let pool = pool();
        pool.add("one", async { Ok(()) }).unwrap();
        pool.close();

        let mut first = pool.as_completed();
        assert!(first.next().await.is_some());
        assert!(first.next().await.is_none());

        let mut second = pool.as_completed();
        assert!(second.next().await.is_none());
    }

    #[tokio::test]
    async fn test_late_additions_fold_into_the_stream() {
        let pool = pool();
        pool.add("first", async { Ok(()) }).unwrap();

        let mut stream = pool.as_completed();
        let first = stream.next().await.unwrap();
        assert_eq!(&*first.name, "first");

        pool.add("second", async { Ok(()) }).unwrap();
        let second = timeout(Duration::from_secs(5), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&*second.name, "second");
    }

    #[tokio::test]
    async fn test_active_names_reflect_running_activities() {
        let pool = pool();
        let stuck = pool
            .add("watcher", async {
                std::future::pending::<()>().await;
                Ok(())
            })
            .unwrap();
        pool.add("done", async { Ok(()) }).unwrap();

        // Let the finished one deregister.
        sleep(Duration::from_millis(50)).await;
        assert_eq!(pool.active_names(), vec!["watcher".to_string()]);

        stuck.cancel();
        stuck.finished().await;
        assert!(pool.active_names().is_empty());
    }
}
