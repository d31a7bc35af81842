//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the task pool, the
//! scheduling loops, and the orchestrator.
//!
//! ## Contents
//! - [`EventKind`], [`Event`], [`Phase`] — classification and payload
//! - [`Bus`] — thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `TaskPool`, `Manager` scheduling loops,
//!   `Orchestrator`, `SubscriberSet` workers (overflow/panic).
//! - **Consumer**: the orchestrator's subscriber listener, which fans
//!   events out to the [`SubscriberSet`](crate::SubscriberSet).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind, Phase};
