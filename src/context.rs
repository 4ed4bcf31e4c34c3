//! Per-call cancellation and deadline handling
//!
//! An [`OperationContext`] carries an optional deadline and an optional
//! [`CancellationToken`]. The default context never expires.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::{Result, StorageError};

/// Cancellation and deadline scope for one storage call
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl OperationContext {
    /// A context that never expires
    pub fn background() -> Self {
        Self::default()
    }

    /// A context expiring `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().deadline(Instant::now() + timeout)
    }

    /// A context ended by cancelling `token`
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self::background().cancellation(token)
    }

    /// Sets the deadline, keeping the earlier one if already set
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// Attaches a cancellation token
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn deadline_instant(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the error this context has already ended with, if any
    pub fn err(&self) -> Option<StorageError> {
        if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Some(StorageError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(StorageError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context ends, with the reason
    pub async fn done(&self) -> StorageError {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => StorageError::Cancelled,
            _ = deadline => StorageError::DeadlineExceeded,
        }
    }

    /// Runs `fut` inside this context.
    ///
    /// An already-ended context fails without polling `fut`.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output>
    where
        F: Future,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            out = fut => Ok(out),
        }
    }
}
