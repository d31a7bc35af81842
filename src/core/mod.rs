//! Runtime core: pool, cancellation domains, and the driver.
//!
//! Internal modules:
//! - [`pool`]: named activity collection with the completion stream;
//! - [`context`]: hierarchical cancellation-domain registry;
//! - [`orchestrator`]: top-level phase-machine driver;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod context;
mod orchestrator;
mod pool;
mod shutdown;

pub use context::{ContextId, ContextRegistry, RunContext};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use pool::{ActivityHandle, ActivityStatus, Completion, CompletionStream, TaskPool};
