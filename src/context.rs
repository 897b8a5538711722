//! Request-scoped cancellation and deadlines.
//!
//! # Responsibilities
//! - Carry a cancellation token and an optional deadline through every call
//! - Derive child contexts with a tighter deadline per endpoint invocation
//! - Release child contexts on every exit path (drop guard)
//!
//! # Design Decisions
//! - Deadlines use Tokio's clock so paused-time tests behave
//! - A child never outlives its parent: its deadline is the earlier of both
//! - Cancelling a child never cancels the parent

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Cancellation token plus deadline, threaded through the backend pipeline.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A root context with no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a child context that expires after `timeout`.
    ///
    /// The returned guard cancels the child when dropped.
    pub fn with_timeout(&self, timeout: Duration) -> (Self, DropGuard) {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) if parent < candidate => parent,
            _ => candidate,
        };
        let token = self.token.child_token();
        let guard = token.clone().drop_guard();
        (
            Self {
                token,
                deadline: Some(deadline),
            },
            guard,
        )
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once the deadline has passed.
    pub fn deadline_exceeded(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// True once the context is cancelled or its deadline has passed.
    pub fn is_done(&self) -> bool {
        self.token.is_cancelled() || self.deadline_exceeded()
    }

    /// Resolves when the context is cancelled or its deadline passes.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }
}
