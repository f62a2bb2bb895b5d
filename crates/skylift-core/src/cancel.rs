//! Cooperative cancellation shared between the interrupt handler and the
//! launch sequencer.
//!
//! The token is both pollable (`is_cancelled`) for use inside bounded loops
//! and awaitable (`cancelled`) so the sequencer can `select!` a phase future
//! against interruption.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// A cancellation token for cooperative shutdown.
///
/// Clones share state: cancelling any clone cancels all of them.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancellationToken {
    /// Create a new cancellation token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake every task awaiting [`cancelled`].
    ///
    /// [`cancelled`]: CancellationToken::cancelled
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called.
    ///
    /// Already-cancelled tokens resolve immediately; any number of tasks may
    /// await the same token.
    pub async fn cancelled(&self) {
        // Register interest before the flag re-check so a cancel() landing
        // between the check and the await cannot be missed.
        let mut notified = std::pin::pin!(self.inner.notify.notified());
        loop {
            if self.is_cancelled() {
                return;
            }
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.as_mut().await;
            notified.set(self.inner.notify.notified());
        }
    }

    /// Check cancellation and return an error if cancelled.
    pub fn check(&self) -> Result<(), CancelledError> {
        if self.is_cancelled() {
            Err(CancelledError)
        } else {
            Ok(())
        }
    }
}

/// Error returned when an operation is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelledError;

impl std::fmt::Display for CancelledError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Operation was cancelled")
    }
}

impl std::error::Error for CancelledError {}

impl From<CancelledError> for crate::error::SkyliftError {
    fn from(_: CancelledError) -> Self {
        crate::error::SkyliftError::Interrupted
    }
}
