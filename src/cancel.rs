//! Run-scoped cooperative cancellation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// A cloneable cancellation signal.
///
/// Cancelling a token is permanent. A child token is cancelled whenever its
/// parent is, but cancelling the child leaves the parent untouched.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    parent: Option<Box<CancelToken>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// Create a fresh, uncancelled token.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            parent: None,
        }
    }

    /// Create a token that also observes this token's cancellation.
    pub fn child(&self) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            parent: Some(Box::new(self.clone())),
        }
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether this token or any ancestor has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow() || self.parent.as_ref().is_some_and(|p| p.is_cancelled())
    }

    /// Resolve once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        match &self.parent {
            Some(parent) => {
                tokio::select! {
                    _ = rx.wait_for(|cancelled| *cancelled) => {}
                    _ = Box::pin(parent.cancelled()) => {}
                }
            }
            None => {
                // The sender lives as long as `self`, so this cannot error.
                let _ = rx.wait_for(|cancelled| *cancelled).await;
            }
        }
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Returns `false` when the sleep was cut short by cancellation.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => !self.is_cancelled(),
            _ = self.cancelled() => false,
        }
    }
}
