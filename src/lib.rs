//! # upkeep
//!
//! **Upkeep** is a task orchestration and scheduling engine for recurring
//! account-maintenance workers: site check-ins, keep-alive pings, chat
//! monitoring, periodic message posting. It runs a dynamic set of named
//! asynchronous workers on independent recurrence schedules for an
//! indefinite process lifetime, tolerating partial failure of any
//! individual worker.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   Manager    │   │   Manager    │   │   Manager    │
//!     │  (check-in)  │   │ (keep-alive) │   │  (monitor)   │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Orchestrator (top-level driver)                                  │
//! │  - Bus (broadcast events) + SubscriberSet (fan-out, LogWriter)    │
//! │  - ContextRegistry (hierarchical cancellation domains)            │
//! │  - TaskPool (named activities, completion stream)                 │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   ┌───────────┐     ┌───────────┐     ┌───────────┐
//!   │ scheduling│     │ scheduling│     │ scheduling│   one loop per
//!   │   loop    │     │   loop    │     │   loop    │   worker:
//!   └─────┬─────┘     └─────┬─────┘     └─────┬─────┘
//!         │ ScheduleRule::next_trigger        │
//!         │ sleep_until (cancellable)         │
//!         │ worker.run_once                   │
//!         ▼                                   ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │   TaskPool::as_completed() — every activity observed exactly      │
//! │   once, in completion order, as completed / failed / cancelled    │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Startup protocol
//! ```text
//! run()
//!  ├─► Init            filter managers by enabled modules
//!  ├─► InstantPhase    (instant && !compressed) one occurrence of every
//!  │                   check-in/keep-alive worker, join the batch
//!  ├─► ScheduledPhase  (skipped when `once`) start notifier, register
//!  │                   scheduling loops, consume the completion stream:
//!  │                     completed / cancelled → log line
//!  │                     failed → log line; fail-fast? → FatalStopping
//!  ├─► Draining        always reached: join notify streams,
//!  │                   ContextRegistry::cancel_all(), grace window
//!  └─► Terminated      Ok(()) or Err(OrchestratorError)
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                   |
//! |-------------------|----------------------------------------------------------|--------------------------------------|
//! | **Workers**       | Define maintenance units with their recurrence rules.    | [`Worker`], [`WorkerFn`], [`Manager`]|
//! | **Scheduling**    | Daily windows, N-day intervals, debug compression.       | [`ScheduleRule`], [`Timing`]         |
//! | **Concurrency**   | Named activity pool with an exactly-once stream.         | [`TaskPool`], [`CompletionStream`]   |
//! | **Cancellation**  | Hierarchical domains with a global shutdown hook.        | [`ContextRegistry`], [`RunContext`]  |
//! | **Observability** | Broadcast events fanned out to isolated subscribers.     | [`Subscribe`], [`LogWriter`]         |
//! | **Configuration** | Module switches, fail-fast, windows, intervals.          | [`Settings`]                         |
//!
//! ## Example
//! ```no_run
//! use tokio_util::sync::CancellationToken;
//! use upkeep::{Manager, Orchestrator, Settings, WorkerError, WorkerFn, WorkerKind};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::from_toml_str(r#"
//!         time = "<6:00PM,10:00PM>"
//!         interval = 3
//!     "#)?;
//!
//!     let checkin = Manager::new(WorkerKind::CheckIn).with_worker(WorkerFn::arc(
//!         "checkin/site-a",
//!         WorkerKind::CheckIn,
//!         settings.checkin_rule()?,
//!         |token: CancellationToken| async move {
//!             if token.is_cancelled() {
//!                 return Err(WorkerError::Cancelled);
//!             }
//!             // sign in against the remote service...
//!             Ok(())
//!         },
//!     ));
//!
//!     let orchestrator = Orchestrator::builder(settings).with_manager(checkin).build();
//!     orchestrator.run().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod notify;
mod schedule;
mod subscribers;
mod workers;

// ---- Public re-exports ----

pub use config::{parse_window, ConfigError, FirstRun, Modules, Settings};
pub use crate::core::{
    ActivityHandle, ActivityStatus, Completion, CompletionStream, ContextId, ContextRegistry,
    Orchestrator, OrchestratorBuilder, RunContext, TaskPool,
};
pub use error::{OrchestratorError, PoolError, WorkerError};
pub use events::{Bus, Event, EventKind, Phase};
pub use notify::{Notifier, NotifyHandle};
pub use schedule::{sleep_until, ScheduleRule, Timing};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use workers::{Manager, Worker, WorkerFn, WorkerKind, WorkerRef};
