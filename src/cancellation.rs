// A first-class cancellation-token abstraction, threaded as an opaque
// first argument through every executor/evaluator call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Notify;

/// Shared state backing a [`CancellationToken`] tree. A child derived with
/// [`CancellationToken::child_with_timeout`] observes both its own cancel
/// and its parent's, without the parent needing to know about children.
struct Inner {
    cancelled: std::sync::atomic::AtomicBool,
    deadline: Option<Instant>,
    notify: Notify,
    parent: Option<CancellationToken>,
}

/// Signals deadline expiry or explicit cancellation to whatever is on the
/// other side of a plug-in call. Cheap to clone (`Arc` inside); cancelling
/// any clone cancels all of them.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: std::sync::atomic::AtomicBool::new(false),
                deadline: None,
                notify: Notify::new(),
                parent: None,
            }),
        }
    }

    /// Derive a child token with its own deadline; cancellation of the
    /// parent or expiry of the child's own deadline both count as cancelled.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: std::sync::atomic::AtomicBool::new(false),
                deadline: Some(Instant::now() + timeout),
                notify: Notify::new(),
                parent: Some(self.clone()),
            }),
        }
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, std::sync::atomic::Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(std::sync::atomic::Ordering::SeqCst) {
            return true;
        }
        if let Some(deadline) = self.inner.deadline {
            if Instant::now() >= deadline {
                return true;
            }
        }
        match &self.inner.parent {
            Some(p) => p.is_cancelled(),
            None => false,
        }
    }

    /// Resolves once this token (or any ancestor) is cancelled or its
    /// deadline passes. Callers that also need to bound the wait on a
    /// deadline should race this against `tokio::time::sleep_until`.
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            self.inner.notify.notified().await;
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
