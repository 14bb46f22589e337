//! Cancellation for long-running traversals.
//!
//! A [`CancelToken`] combines a shared flag with an optional deadline. Walks
//! poll it periodically and stop with `GraphError::Cancelled` once it fires.
//! Traversals never mutate, so a cancelled walk leaves nothing behind.

use crate::error::{GraphError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How many visited vertices between polls of the token.
const POLL_INTERVAL: usize = 256;

/// Cooperative cancellation signal for graph walks.
///
/// Clones share the same flag, so one clone can be handed to a query while
/// another is kept to call [`cancel`](Self::cancel).
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that only fires when cancelled by hand.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that fires at `deadline`.
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            flag: Arc::default(),
            deadline: Some(deadline),
        }
    }

    /// A token that fires once `timeout` has elapsed from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Signal cancellation to every clone of this token.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether the token has been cancelled or its deadline has passed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Poll the token every [`POLL_INTERVAL`] steps, starting with step 0.
    pub(crate) fn checkpoint(&self, step: usize, reached: usize) -> Result<()> {
        if step % POLL_INTERVAL == 0 && self.is_cancelled() {
            tracing::debug!(reached, "Traversal cancelled");
            return Err(GraphError::Cancelled { reached });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_live() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.checkpoint(0, 0).is_ok());
    }

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let handle = token.clone();
        handle.cancel();

        assert!(token.is_cancelled());
        assert!(matches!(
            token.checkpoint(0, 3),
            Err(GraphError::Cancelled { reached: 3 })
        ));
    }

    #[test]
    fn expired_deadline_fires() {
        let token = CancelToken::with_deadline(Instant::now());
        assert!(token.is_cancelled());
    }

    #[test]
    fn checkpoint_only_polls_on_interval() {
        let token = CancelToken::new();
        token.cancel();
        assert!(token.checkpoint(1, 1).is_ok());
        assert!(token.checkpoint(POLL_INTERVAL, 1).is_err());
    }
}
