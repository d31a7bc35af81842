//! # Notifier collaborator seam.
//!
//! The notification-delivery subsystem is an external collaborator: its
//! message content and transport are out of this crate's hands, but its
//! lifecycle is not. The orchestrator starts it when entering scheduled
//! operation and joins every returned [`NotifyHandle`] during draining,
//! so in-flight deliveries finish before the process exits.

use std::borrow::Cow;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::error::OrchestratorError;

/// Joinable handle to one background delivery stream.
pub struct NotifyHandle {
    name: Cow<'static, str>,
    join: JoinHandle<()>,
}

impl NotifyHandle {
    /// Wraps a spawned delivery stream.
    pub fn new(name: impl Into<Cow<'static, str>>, join: JoinHandle<()>) -> Self {
        Self {
            name: name.into(),
            join,
        }
    }

    /// Returns the stream's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Awaits completion of in-flight delivery.
    pub async fn join(self) {
        let _ = self.join.await;
    }
}

/// Notification-delivery subsystem lifecycle hooks.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// Starts the delivery streams and returns their joinable handles.
    async fn start(&self) -> Result<Vec<NotifyHandle>, OrchestratorError>;
}
