//! Cancellation and deadlines for database operations
//!
//! A [`Context`] is passed to every operation that touches the store or the
//! network. Clones share cancellation: canceling any clone cancels them all.

use crate::{DbError, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Cancellation signal plus optional deadline
#[derive(Clone, Debug)]
pub struct Context {
    cancel: Arc<watch::Sender<bool>>,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never canceled and has no deadline
    pub fn background() -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            cancel: Arc::new(cancel),
            deadline: None,
        }
    }

    /// A context that expires after `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A context that expires at `deadline`
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..Self::background()
        }
    }

    /// Get the deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this context and every clone of it
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Why the context is done, or `None` while it is live
    pub fn err(&self) -> Option<DbError> {
        if *self.cancel.borrow() {
            return Some(DbError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(DbError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Wait until the context is canceled or expires
    pub async fn done(&self) -> DbError {
        let mut rx = self.cancel.subscribe();
        let canceled = async move {
            // The sender lives in `self`, so this only returns on cancel
            let _ = rx.wait_for(|canceled| *canceled).await;
        };

        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = canceled => DbError::Canceled,
                _ = tokio::time::sleep_until(deadline) => DbError::DeadlineExceeded,
            },
            None => {
                canceled.await;
                DbError::Canceled
            }
        }
    }

    /// Drive `fut` until it finishes or the context is done, whichever is first.
    ///
    /// The future is dropped on cancellation.
    pub async fn run<T, E, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: Into<DbError>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }

        tokio::select! {
            biased;
            result = fut => result.map_err(Into::into),
            err = self.done() => Err(err),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}
