//! # Call Context
//!
//! The deadline and cancellation signal carried by one verb invocation. Every remote
//! call the engine makes is raced against both, so the caller is released at the
//! deadline (or on cancellation) even if the remote side is mid-request.

use crate::error::Verb;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a raced call did not finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    DeadlineExceeded,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct CallContext {
    verb: Verb,
    deadline: Instant,
    cancellation: CancellationToken,
}

impl CallContext {
    pub fn new(verb: Verb, timeout: Duration) -> Self {
        Self::with_deadline(verb, Instant::now() + timeout)
    }

    pub fn with_deadline(verb: Verb, deadline: Instant) -> Self {
        Self {
            verb,
            deadline,
            cancellation: CancellationToken::new(),
        }
    }

    /// Ties this context to a parent token: cancelling the parent cancels this call,
    /// cancelling this call leaves the parent alone.
    pub fn with_parent(mut self, parent: &CancellationToken) -> Self {
        self.cancellation = parent.child_token();
        self
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves when the deadline passes or the call is cancelled, whichever is first.
    pub async fn interrupted(&self) -> Interrupted {
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Interrupted::Cancelled,
            _ = tokio::time::sleep_until(self.deadline) => Interrupted::DeadlineExceeded,
        }
    }

    /// Drives `fut` to completion unless the call is interrupted first. The future is
    /// dropped on interruption.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        tokio::select! {
            biased;
            reason = self.interrupted() => Err(reason),
            output = fut => Ok(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_run_completes_before_deadline() {
        let ctx = CallContext::new(Verb::Read, Duration::from_secs(5));
        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                7
            })
            .await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_releases_caller_at_deadline() {
        let ctx = CallContext::new(Verb::Create, Duration::from_secs(2));
        let started = Instant::now();
        let result = ctx
            .run(tokio::time::sleep(Duration::from_secs(3600)))
            .await;
        assert_eq!(result, Err(Interrupted::DeadlineExceeded));
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_parent_cancellation_propagates() {
        let parent = CancellationToken::new();
        let ctx = CallContext::new(Verb::Delete, Duration::from_secs(60)).with_parent(&parent);
        parent.cancel();
        assert!(ctx.is_cancelled());
        let result = ctx.run(std::future::pending::<()>()).await;
        assert_eq!(result, Err(Interrupted::Cancelled));
    }

    #[tokio::test]
    async fn test_child_cancellation_leaves_parent_running() {
        let parent = CancellationToken::new();
        let ctx = CallContext::new(Verb::Update, Duration::from_secs(60)).with_parent(&parent);
        ctx.cancel();
        assert!(ctx.is_cancelled());
        assert!(!parent.is_cancelled());
    }
}
