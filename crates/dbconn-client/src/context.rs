//! Caller-supplied cancellation with an optional deadline.

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a [`Context`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CancelCause {
    /// The context was cancelled explicitly.
    #[error("context canceled")]
    Cancelled,
    /// The context ran past its deadline.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation signal passed into long-running operations.
///
/// A context ends when its token is cancelled or its deadline passes,
/// whichever comes first. Child contexts end with their parent.
///
/// # Example
///
/// ```rust,ignore
/// let ctx = Context::background().with_timeout(Duration::from_secs(5));
/// let client = Client::connect(&ctx, driver, config, []).await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that never ends on its own.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Wrap an existing cancellation token.
    #[must_use]
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derive a child context that also ends at `deadline`.
    ///
    /// The earlier of the parent's and the new deadline applies.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Derive a child context that ends after `timeout`.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a child context that can be cancelled on its own.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancel this context and its children.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Why the context has ended, or `None` while it is live.
    #[must_use]
    pub fn err(&self) -> Option<CancelCause> {
        if self.token.is_cancelled() {
            return Some(CancelCause::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelCause::DeadlineExceeded),
            _ => None,
        }
    }

    /// Wait until the context ends.
    pub async fn done(&self) -> CancelCause {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    () = self.token.cancelled() => CancelCause::Cancelled,
                    () = tokio::time::sleep_until(deadline) => CancelCause::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                CancelCause::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel() {
        let ctx = Context::background();
        assert_eq!(ctx.err(), None);

        ctx.cancel();
        assert_eq!(ctx.err(), Some(CancelCause::Cancelled));
        assert_eq!(ctx.done().await, CancelCause::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline() {
        let ctx = Context::background().with_timeout(Duration::from_secs(2));
        assert_eq!(ctx.err(), None);

        let start = Instant::now();
        assert_eq!(ctx.done().await, CancelCause::DeadlineExceeded);
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert_eq!(ctx.err(), Some(CancelCause::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_parent_cancels_child() {
        let parent = Context::background();
        let child = parent.with_timeout(Duration::from_secs(60));

        parent.cancel();
        assert_eq!(child.err(), Some(CancelCause::Cancelled));
    }

    #[tokio::test]
    async fn test_child_deadline_never_extends_parent() {
        let parent = Context::background().with_timeout(Duration::from_secs(1));
        let child = parent.with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[test]
    fn test_cancel_cause_display() {
        assert_eq!(CancelCause::Cancelled.to_string(), "context canceled");
        assert_eq!(
            CancelCause::DeadlineExceeded.to_string(),
            "context deadline exceeded"
        );
    }
}
