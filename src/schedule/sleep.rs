//! # Cancellable wall-clock sleep.
//!
//! Scheduling loops suspend until a computed trigger instant with
//! [`sleep_until`]. The wait is cooperative on two axes:
//! - cancellation of the run context wins immediately and unwinds with
//!   [`WorkerError::Cancelled`];
//! - the wait is split into bounded chunks with the wall clock re-read
//!   between them, so a multi-day wait tracks the real calendar instead
//!   of a single monotonic timer.

use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;

/// Upper bound on a single timer chunk.
const MAX_CHUNK: Duration = Duration::from_secs(60);

/// Suspends until `deadline` (local wall clock) or cancellation.
///
/// Returns `Ok(())` when the deadline is reached (immediately if it is
/// already in the past) and `Err(WorkerError::Cancelled)` as soon as the
/// token fires.
pub async fn sleep_until(
    deadline: NaiveDateTime,
    token: &CancellationToken,
) -> Result<(), WorkerError> {
    loop {
        let now = Local::now().naive_local();
        let remaining = match (deadline - now).to_std() {
            Ok(d) if !d.is_zero() => d,
            _ => return Ok(()),
        };

        let sleep = time::sleep(remaining.min(MAX_CHUNK));
        tokio::pin!(sleep);
        tokio::select! {
            _ = &mut sleep => {}
            _ = token.cancelled() => return Err(WorkerError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_past_deadline_returns_immediately() {
        let token = CancellationToken::new();
        let deadline = Local::now().naive_local() - chrono::Duration::seconds(5);
        let started = Instant::now();
        sleep_until(deadline, &token).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_short_deadline_elapses() {
        let token = CancellationToken::new();
        let deadline = Local::now().naive_local() + chrono::Duration::milliseconds(50);
        sleep_until(deadline, &token).await.unwrap();
        assert!(Local::now().naive_local() >= deadline);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_the_wait() {
        let token = CancellationToken::new();
        let deadline = Local::now().naive_local() + chrono::Duration::seconds(30);

        let cancel = token.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let started = Instant::now();
        let err = sleep_until(deadline, &token).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
