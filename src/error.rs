//! Error types used by the upkeep runtime and workers.
//!
//! This module defines the error taxonomy of the engine:
//!
//! - [`WorkerError`] — errors raised by a single worker occurrence.
//! - [`PoolError`] — errors raised by the task pool itself.
//! - [`OrchestratorError`] — errors that terminate the whole run.
//!
//! A [`WorkerError::Cancelled`] is not a true error: it is the cooperative
//! unwind signal of a cancelled run context, and the pool classifies an
//! activity that returns it as `Cancelled`, not `Failed`.

use thiserror::Error;

use crate::config::ConfigError;

/// # Errors produced by a single worker occurrence.
///
/// An [`WorkerError::Action`] failure is isolated by default: it ends that
/// worker's scheduling loop, while every other activity keeps running. Only
/// when fail-fast is enabled does the orchestrator escalate it into an
/// [`OrchestratorError::WorkerFailed`].
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WorkerError {
    /// The worker's action failed for this occurrence.
    #[error("action failed: {error}")]
    Action {
        /// The underlying error message.
        error: String,
    },

    /// The worker observed its run context being cancelled and unwound.
    #[error("run context cancelled")]
    Cancelled,

    /// The worker's future panicked; the panic was captured by the pool.
    #[error("worker panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl WorkerError {
    /// Shorthand for an [`WorkerError::Action`] from any displayable error.
    pub fn action(error: impl ToString) -> Self {
        WorkerError::Action {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use upkeep::WorkerError;
    ///
    /// assert_eq!(WorkerError::Cancelled.as_label(), "worker_cancelled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::Action { .. } => "worker_action_failed",
            WorkerError::Cancelled => "worker_cancelled",
            WorkerError::Panicked { .. } => "worker_panicked",
        }
    }

    /// True for the cooperative-cancellation variant.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WorkerError::Cancelled)
    }
}

/// # Errors produced by the task pool.
#[non_exhaustive]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PoolError {
    /// The pool was closed; no further activities can be added.
    #[error("task pool is closed")]
    Closed,
}

/// # Errors that terminate the orchestrator run.
///
/// These surface from [`Orchestrator::run`](crate::Orchestrator::run); the
/// embedding process maps them to a non-zero exit code.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// A worker failed while fail-fast was enabled.
    #[error("worker '{task}' failed fatally: {error}")]
    WorkerFailed {
        /// Name of the failed activity.
        task: String,
        /// The underlying worker error message.
        error: String,
    },

    /// The notifier collaborator could not start its delivery streams.
    #[error("notifier failed to start: {error}")]
    Notifier {
        /// The underlying error message.
        error: String,
    },

    /// Configuration was invalid.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The task pool rejected a registration.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

impl OrchestratorError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            OrchestratorError::WorkerFailed { .. } => "orchestrator_worker_failed",
            OrchestratorError::Notifier { .. } => "orchestrator_notifier",
            OrchestratorError::Config(_) => "orchestrator_config",
            OrchestratorError::Pool(_) => "orchestrator_pool",
        }
    }
}
