//! Event subscribers for runtime observability.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`]
//! fan-out, and the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   pool / managers / orchestrator ── publish ──► Bus
//!                                                  │
//!                                   orchestrator listener
//!                                                  │
//!                                          SubscriberSet::emit
//!                                     ┌────────────┼────────────┐
//!                                     ▼            ▼            ▼
//!                                 LogWriter     metrics      custom...
//! ```

mod log;
mod set;
mod subscriber;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
