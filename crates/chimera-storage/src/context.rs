//! Deadline and cancellation scope for store operations.
//!
//! A `Context` bounds how long a pool operation may wait for a connection
//! and how long a statement may run. Cancelling a context cancels every
//! context derived from it; deriving never cancels the parent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chimera_core::errors::{StoreError, StoreResult};

#[derive(Debug, Default)]
struct CancelNode {
    cancelled: AtomicBool,
    parent: Option<Arc<CancelNode>>,
}

impl CancelNode {
    fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::Acquire) {
            return true;
        }
        let mut next = self.parent.as_deref();
        while let Some(node) = next {
            if node.cancelled.load(Ordering::Acquire) {
                return true;
            }
            next = node.parent.as_deref();
        }
        false
    }
}

#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancel: Arc<CancelNode>,
}

impl Context {
    /// No deadline, never cancelled unless `cancel` is called.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancel: Arc::default(),
        }
    }

    /// Derive a context that expires after `timeout` or at this context's
    /// deadline, whichever comes first.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) if parent < candidate => parent,
            _ => candidate,
        };
        Self {
            deadline: Some(deadline),
            cancel: Arc::new(CancelNode {
                cancelled: AtomicBool::new(false),
                parent: Some(Arc::clone(&self.cancel)),
            }),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancelled.store(true, Ordering::Release);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` without a deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.is_expired()
    }

    /// `Err` once the context is cancelled or past its deadline.
    pub fn check(&self) -> StoreResult<()> {
        if self.is_cancelled() {
            Err(StoreError::Cancelled)
        } else if self.is_expired() {
            Err(StoreError::DeadlineExceeded)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_is_never_done() {
        let ctx = Context::background();
        assert!(!ctx.is_done());
        assert!(ctx.remaining().is_none());
        ctx.check().unwrap();
    }

    #[test]
    fn zero_timeout_is_immediately_expired() {
        let ctx = Context::with_timeout(Duration::ZERO);
        assert!(ctx.is_expired());
        assert!(matches!(ctx.check(), Err(StoreError::DeadlineExceeded)));
    }

    #[test]
    fn cancel_propagates_to_children_only() {
        let parent = Context::background();
        let child = parent.child_with_timeout(Duration::from_secs(60));
        let grandchild = child.child_with_timeout(Duration::from_secs(60));

        child.cancel();
        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
        assert!(!parent.is_cancelled());

        parent.cancel();
        assert!(matches!(grandchild.check(), Err(StoreError::Cancelled)));
    }

    #[test]
    fn child_keeps_earlier_parent_deadline() {
        let parent = Context::with_timeout(Duration::from_millis(10));
        let child = parent.child_with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());

        let tight = parent.child_with_timeout(Duration::from_millis(1));
        assert!(tight.deadline() < parent.deadline());
    }

    #[test]
    fn clones_share_cancellation() {
        let ctx = Context::with_timeout(Duration::from_secs(60));
        let clone = ctx.clone();
        clone.cancel();
        assert!(ctx.is_cancelled());
    }
}
