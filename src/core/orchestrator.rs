//! # Orchestrator: top-level driver of the maintenance run.
//!
//! Composes managers into one [`TaskPool`], applies the
//! instant-then-scheduled startup protocol, consumes the completion
//! stream, and decides whether a worker failure is isolated or fatal.
//!
//! ## State machine
//! ```text
//! Init ──► InstantPhase ──► ScheduledPhase ──► Draining ──► Terminated
//!            (optional)        (skipped            ▲
//!                               when `once`)       │
//!                                                  always reached:
//!                                                  error, fatal escalation
//!                                                  and OS signal included
//! ```
//!
//! - `Init`: filter builder-provided managers by the enabled modules,
//!   wire the subscriber listener to the bus.
//! - `InstantPhase`: only when instant mode is requested and timing is
//!   not compressed; run every instant-capable manager's batch and join.
//! - `ScheduledPhase`: start the notifier (handles retained), register
//!   every manager's scheduling loops, consume the completion stream.
//!   Completed/cancelled → event only; failed → event, plus fail-fast
//!   escalation when `nofail` is off.
//! - `Draining`: join notification streams, `cancel_all()` on the
//!   context registry unconditionally, then wait out the grace window.
//! - `Terminated`: `run()` resolves; the embedding process maps the
//!   result to its exit code.
//!
//! The whole drive races the OS shutdown signal, so Ctrl-C/SIGTERM lands
//! in `Draining` exactly like a fatal failure does.

use std::sync::Arc;

use tokio::time;

use crate::config::Settings;
use crate::core::context::ContextRegistry;
use crate::core::pool::{ActivityStatus, TaskPool};
use crate::core::shutdown;
use crate::error::OrchestratorError;
use crate::events::{Bus, Event, EventKind, Phase};
use crate::notify::{Notifier, NotifyHandle};
use crate::subscribers::{LogWriter, Subscribe, SubscriberSet};
use crate::workers::Manager;

/// Builder for an [`Orchestrator`].
pub struct OrchestratorBuilder {
    settings: Settings,
    managers: Vec<Manager>,
    notifier: Option<Arc<dyn Notifier>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl OrchestratorBuilder {
    /// Creates a builder with the given settings.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            managers: Vec::new(),
            notifier: None,
            subscribers: Vec::new(),
        }
    }

    /// Adds a manager. Managers of disabled modules are filtered out at
    /// init, so it is fine to always register the full set.
    pub fn with_manager(mut self, manager: Manager) -> Self {
        self.managers.push(manager);
        self
    }

    /// Sets the notification-delivery collaborator.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Adds an event subscriber. When none is added, a [`LogWriter`] is
    /// installed so terminal activities still produce their log lines.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Builds the orchestrator. Must be called within a tokio runtime
    /// (subscriber workers are spawned here).
    pub fn build(mut self) -> Orchestrator {
        self.settings.normalize();
        let bus = Bus::new(self.settings.bus_capacity);
        if self.subscribers.is_empty() {
            self.subscribers.push(Arc::new(LogWriter::new()));
        }
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));

        Orchestrator {
            pool: TaskPool::new(bus.clone()),
            contexts: ContextRegistry::new(),
            settings: self.settings,
            managers: self.managers,
            notifier: self.notifier,
            bus,
            subs,
        }
    }
}

/// Top-level driver: managers, pool, context registry, event fan-out.
///
/// # Example
/// ```no_run
/// use tokio_util::sync::CancellationToken;
/// use upkeep::{Manager, Orchestrator, Settings, WorkerError, WorkerFn, WorkerKind};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let settings = Settings::default();
///     let checkin = Manager::new(WorkerKind::CheckIn).with_worker(WorkerFn::arc(
///         "checkin/site-a",
///         WorkerKind::CheckIn,
///         settings.checkin_rule()?,
///         |_token: CancellationToken| async move {
///             // sign in against the remote bot...
///             Ok::<_, WorkerError>(())
///         },
///     ));
///
///     let orchestrator = Orchestrator::builder(settings).with_manager(checkin).build();
///     orchestrator.run().await?;
///     Ok(())
/// }
/// ```
pub struct Orchestrator {
    settings: Settings,
    managers: Vec<Manager>,
    notifier: Option<Arc<dyn Notifier>>,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    pool: TaskPool,
    contexts: Arc<ContextRegistry>,
}

impl Orchestrator {
    /// Returns a builder for the given settings.
    pub fn builder(settings: Settings) -> OrchestratorBuilder {
        OrchestratorBuilder::new(settings)
    }

    /// Returns the event bus (subscribe for tests, dashboards, etc.).
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Returns the context registry.
    pub fn contexts(&self) -> &Arc<ContextRegistry> {
        &self.contexts
    }

    /// Returns the task pool.
    pub fn pool(&self) -> &TaskPool {
        &self.pool
    }

    /// Drives the whole run to completion.
    ///
    /// Resolves when the instant-only run finishes (`once`), when a
    /// worker failure escalates under fail-fast, or when an OS
    /// termination signal arrives. Draining — joining notification
    /// streams and cancelling every run context — happens on every one
    /// of those paths before this returns.
    pub async fn run(self) -> Result<(), OrchestratorError> {
        self.subscriber_listener();
        self.publish_phase(Phase::Init);
        let managers: Vec<&Manager> = self
            .managers
            .iter()
            .filter(|m| self.settings.modules.enabled(m.kind()))
            .collect();

        let mut streams: Vec<NotifyHandle> = Vec::new();
        let result = tokio::select! {
            result = self.drive(&managers, &mut streams) => result,
            _ = shutdown::wait_for_shutdown_signal() => {
                self.bus.publish(Event::now(EventKind::ShutdownRequested));
                Ok(())
            }
        };

        self.publish_phase(Phase::Draining);
        self.drain(streams).await;
        self.publish_phase(Phase::Terminated);
        result
    }

    /// Subscribes to the bus and forwards events to the subscriber set.
    fn subscriber_listener(&self) {
        let mut rx = self.bus.subscribe();
        let subs = Arc::clone(&self.subs);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => subs.emit(&ev),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// Instant phase, then scheduled operation.
    async fn drive(
        &self,
        managers: &[&Manager],
        streams: &mut Vec<NotifyHandle>,
    ) -> Result<(), OrchestratorError> {
        let timing = self.settings.timing();

        if self.settings.instant && !timing.is_compressed() {
            self.publish_phase(Phase::Instant);
            let batches = managers
                .iter()
                .filter(|m| m.kind().supports_instant())
                .map(|manager| manager.run_all(&self.pool, &self.contexts, true));
            futures::future::try_join_all(batches).await?;
        }

        if self.settings.once {
            return Ok(());
        }

        self.publish_phase(Phase::Scheduled);
        if let Some(notifier) = &self.notifier {
            streams.extend(notifier.start().await?);
        }
        for manager in managers {
            manager.schedule_all(
                &self.pool,
                &self.contexts,
                timing,
                self.settings.first_run,
                &self.bus,
            )?;
        }

        // Instant-phase completions that nobody consumed yet are folded
        // into this same stream.
        let mut completed = self.pool.as_completed();
        while let Some(done) = completed.next().await {
            match done.status {
                ActivityStatus::Completed | ActivityStatus::Cancelled => {}
                ActivityStatus::Failed(e) => {
                    if !self.settings.nofail {
                        self.bus.publish(
                            Event::now(EventKind::FatalStopping)
                                .with_task(done.name.clone())
                                .with_error(e.to_string()),
                        );
                        return Err(OrchestratorError::WorkerFailed {
                            task: done.name.to_string(),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Draining: join notification streams, cancel every run context,
    /// wait out the grace window.
    async fn drain(&self, streams: Vec<NotifyHandle>) {
        for stream in streams {
            stream.join().await;
        }
        self.contexts.cancel_all();

        match time::timeout(self.settings.grace_period(), self.pool.wait()).await {
            Ok(()) => {
                self.bus.publish(Event::now(EventKind::AllStoppedWithin));
            }
            Err(_) => {
                let stuck = self.pool.active_names().join(", ");
                self.bus
                    .publish(Event::now(EventKind::GraceExceeded).with_error(stuck));
            }
        }
    }

    fn publish_phase(&self, phase: Phase) {
        self.bus
            .publish(Event::now(EventKind::PhaseEntered).with_phase(phase));
    }
}
