//! Cancellable operation context handed to every verification and lookup.
//!
//! A [`Context`] carries a shared cancellation flag and an optional deadline.
//! Clones share the flag, so cancelling any clone cancels them all.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::error::VerifyError;

#[derive(Debug)]
struct ContextState {
    cancelled: AtomicBool,
    notify: Notify,
}

#[derive(Debug, Clone)]
pub struct Context {
    state: Arc<ContextState>,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled unless [`Context::cancel`] is called.
    pub fn background() -> Self {
        Self {
            state: Arc::new(ContextState {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
            deadline: None,
        }
    }

    /// Derive a context that also expires after `timeout`.
    ///
    /// The derived context shares cancellation with `self` and keeps the
    /// earlier of the two deadlines.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self {
            state: Arc::clone(&self.state),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }

    pub fn cancel(&self) {
        if !self.state.cancelled.swap(true, Ordering::Release) {
            self.state.notify.notify_waiters();
        }
    }

    /// Returns the error describing why the context is done, or `None` while it is live.
    pub fn err(&self) -> Option<VerifyError> {
        if self.is_cancelled() {
            return Some(VerifyError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(VerifyError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> VerifyError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.cancelled() => VerifyError::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => VerifyError::DeadlineExceeded,
                }
            }
            None => {
                self.cancelled().await;
                VerifyError::Cancelled
            }
        }
    }

    async fn cancelled(&self) {
        loop {
            let notified = self.state.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_is_live() {
        let ctx = Context::background();
        assert!(!ctx.is_cancelled());
        assert!(ctx.err().is_none());
        assert!(ctx.deadline().is_none());
    }

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let ctx = Context::background();
        let child = ctx.with_timeout(Duration::from_secs(60));
        ctx.cancel();
        assert!(child.is_cancelled());
        assert!(matches!(child.err(), Some(VerifyError::Cancelled)));
    }

    #[tokio::test]
    async fn test_expired_deadline_reports_error() {
        let ctx = Context::background().with_timeout(Duration::ZERO);
        assert!(matches!(ctx.err(), Some(VerifyError::DeadlineExceeded)));
        assert!(matches!(ctx.done().await, VerifyError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_done_wakes_on_cancel() {
        let ctx = Context::background();
        let waiter = ctx.clone();
        let handle = tokio::spawn(async move { waiter.done().await });
        tokio::task::yield_now().await;
        ctx.cancel();
        let err = handle.await.expect("task panicked");
        assert!(matches!(err, VerifyError::Cancelled));
    }

    #[test]
    fn test_with_timeout_keeps_earlier_deadline() {
        let short = Context::background().with_timeout(Duration::from_secs(1));
        let long = short.with_timeout(Duration::from_secs(3600));
        assert_eq!(short.deadline(), long.deadline());
    }
}
