//! # Long-Running Operation Tracker
//!
//! Wraps an asynchronous remote mutation and holds the caller until the provider
//! reports a terminal outcome.
//!
//! ## Polling
//!
//! Each status check is spawned onto the runtime and raced against the call's
//! deadline and cancellation token. When the caller is released early the in-flight
//! poll is detached rather than aborted, and the [`OperationHandle`] travels back in
//! the error so an independent [`OperationTracker::status`] check stays possible.
//!
//! Between polls the tracker backs off according to the configured [`PollPolicy`].
//! Poll errors other than `NotFound` end the wait; retrying them is the remote
//! client's business.

use crate::config::PollPolicy;
use crate::context::{CallContext, Interrupted};
use crate::error::{ErrorKind, RemoteError};
use crate::locator::ResourceLocator;
use crate::remote::{MutationKind, Payload, RemoteClient, Submission};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// One in-flight remote mutation. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationHandle {
    token: String,
    kind: MutationKind,
}

impl OperationHandle {
    pub fn new(token: impl Into<String>, kind: MutationKind) -> Self {
        Self {
            token: token.into(),
            kind,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn kind(&self) -> MutationKind {
        self.kind
    }
}

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.token)
    }
}

/// What a single status check reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    InProgress,
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalOutcome {
    Succeeded,
    FailedRemotely(String),
    /// The targeted object is gone. Success for a delete, a failure otherwise.
    NotFound,
}

#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("request rejected: {0}")]
    Rejected(RemoteError),
    #[error("deadline exceeded")]
    DeadlineExceeded { pending: Option<OperationHandle> },
    #[error("cancelled")]
    Cancelled { pending: Option<OperationHandle> },
    #[error("polling failed: {0}")]
    Poll(RemoteError),
}

impl OperationError {
    fn interrupted(reason: Interrupted, pending: Option<&OperationHandle>) -> Self {
        let pending = pending.cloned();
        match reason {
            Interrupted::DeadlineExceeded => OperationError::DeadlineExceeded { pending },
            Interrupted::Cancelled => OperationError::Cancelled { pending },
        }
    }

    /// The operation still running remotely, if the caller was released early.
    pub fn pending(&self) -> Option<&OperationHandle> {
        match self {
            OperationError::DeadlineExceeded { pending } | OperationError::Cancelled { pending } => {
                pending.as_ref()
            }
            _ => None,
        }
    }
}

impl From<OperationError> for ErrorKind {
    fn from(err: OperationError) -> Self {
        match err {
            OperationError::Rejected(e) | OperationError::Poll(e) => ErrorKind::from_remote(e),
            OperationError::DeadlineExceeded { pending } => ErrorKind::DeadlineExceeded {
                operation: pending.map(|h| h.token().to_string()),
            },
            OperationError::Cancelled { pending } => ErrorKind::Cancelled {
                operation: pending.map(|h| h.token().to_string()),
            },
        }
    }
}

#[derive(Clone)]
pub struct OperationTracker {
    client: Arc<dyn RemoteClient>,
    policy: PollPolicy,
}

impl OperationTracker {
    pub fn new(client: Arc<dyn RemoteClient>, policy: PollPolicy) -> Self {
        Self { client, policy }
    }

    /// Submits a mutation. A synchronous refusal comes back as [`OperationError::Rejected`]
    /// with the provider's classification intact.
    ///
    /// The submission runs on its own task. If the caller is released before the
    /// provider answers, the error carries no pending handle because none exists yet;
    /// the submission still finishes in the background and a late acceptance is logged
    /// with its handle.
    pub async fn start(
        &self,
        kind: MutationKind,
        locator: &ResourceLocator,
        payload: Payload,
        ctx: &CallContext,
    ) -> Result<Submission, OperationError> {
        debug!(%kind, %locator, ?payload, "Submitting");
        let client = Arc::clone(&self.client);
        let submit_locator = locator.clone();
        let submit_ctx = ctx.clone();
        let mut submit =
            tokio::spawn(async move { client.submit(kind, &submit_locator, payload, &submit_ctx).await });

        let answered = tokio::select! {
            biased;
            reason = ctx.interrupted() => Err(reason),
            joined = &mut submit => Ok(joined),
        };

        match answered {
            Ok(Ok(submitted)) => submitted.map_err(OperationError::Rejected),
            Ok(Err(e)) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Ok(Err(e)) => Err(OperationError::Rejected(RemoteError::unknown(format!(
                "submit task failed: {e}"
            )))),
            Err(reason) => {
                warn!(%kind, %locator, "Released before the submission was answered");
                let locator = locator.clone();
                tokio::spawn(async move {
                    match submit.await {
                        Ok(Ok(Submission::Accepted(handle))) => {
                            warn!(%locator, operation = %handle, "Accepted after the caller was released")
                        }
                        Ok(Ok(Submission::Completed)) => {
                            warn!(%locator, %kind, "Completed after the caller was released")
                        }
                        Ok(Err(e)) => debug!(%locator, error = %e, "Refused after the caller was released"),
                        Err(e) => debug!(%locator, error = %e, "Submit task failed"),
                    }
                });
                Err(OperationError::interrupted(reason, None))
            }
        }
    }

    /// Polls `handle` until the operation reaches a terminal outcome, the deadline
    /// passes or the call is cancelled.
    pub async fn wait(&self, handle: &OperationHandle, ctx: &CallContext) -> Result<TerminalOutcome, OperationError> {
        let mut interval = self.policy.initial_interval;
        let mut polls: u32 = 0;

        loop {
            polls += 1;
            let client = Arc::clone(&self.client);
            let poll_handle = handle.clone();
            let poll_ctx = ctx.clone();
            let mut poll = tokio::spawn(async move { client.poll(&poll_handle, &poll_ctx).await });

            let status = tokio::select! {
                biased;
                reason = ctx.interrupted() => {
                    warn!(operation = %handle, polls, "Released before the operation finished");
                    return Err(OperationError::interrupted(reason, Some(handle)));
                }
                joined = &mut poll => joined
                    .map_err(|e| OperationError::Poll(RemoteError::unknown(format!("poll task failed: {e}"))))?,
            };

            match status {
                Ok(OperationStatus::InProgress) => {
                    debug!(operation = %handle, polls, ?interval, "In progress");
                }
                Ok(OperationStatus::Succeeded) => {
                    debug!(operation = %handle, polls, "Succeeded");
                    return Ok(TerminalOutcome::Succeeded);
                }
                Ok(OperationStatus::Failed(cause)) => {
                    warn!(operation = %handle, polls, %cause, "Failed remotely");
                    return Ok(TerminalOutcome::FailedRemotely(cause));
                }
                Err(e) if e.is_not_found() => {
                    debug!(operation = %handle, polls, "Target not found");
                    return Ok(TerminalOutcome::NotFound);
                }
                Err(e) => return Err(OperationError::Poll(e)),
            }

            if let Err(reason) = ctx.run(tokio::time::sleep(interval)).await {
                warn!(operation = %handle, polls, "Released before the operation finished");
                return Err(OperationError::interrupted(reason, Some(handle)));
            }
            interval = self.policy.next_interval(interval);
        }
    }

    /// An independent status check, e.g. for an operation left pending by an
    /// interrupted [`wait`](Self::wait).
    pub async fn status(&self, handle: &OperationHandle, ctx: &CallContext) -> Result<OperationStatus, OperationError> {
        ctx.run(self.client.poll(handle, ctx))
            .await
            .map_err(|reason| OperationError::interrupted(reason, Some(handle)))?
            .map_err(OperationError::Poll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Verb;
    use crate::mock::MockRemote;
    use std::time::Duration;
    use tokio::time::Instant;

    fn tracker(mock: &MockRemote) -> OperationTracker {
        OperationTracker::new(mock.client(), PollPolicy::fixed(Duration::from_secs(1)))
    }

    fn handle() -> OperationHandle {
        OperationHandle::new("op-1", MutationKind::Create)
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_terminal_outcome() {
        let mut mock = MockRemote::new();
        mock.expect_poll().return_status(OperationStatus::InProgress);
        mock.expect_poll().return_status(OperationStatus::InProgress);
        mock.expect_poll().return_status(OperationStatus::Succeeded);

        let ctx = CallContext::new(Verb::Create, Duration::from_secs(60));
        let started = Instant::now();
        let outcome = tracker(&mock).wait(&handle(), &ctx).await.unwrap();

        assert_eq!(outcome, TerminalOutcome::Succeeded);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
        mock.verify();
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_submission_finishes_after_caller_is_released() {
        let mut mock = MockRemote::new();
        let locator = ResourceLocator::new("things", "a").within("group", "rg1");
        mock.expect_submit(MutationKind::Create)
            .after(Duration::from_secs(10))
            .return_accepted("op-7");

        let ctx = CallContext::new(Verb::Create, Duration::from_secs(1));
        let started = Instant::now();
        let err = tracker(&mock)
            .start(MutationKind::Create, &locator, serde_json::json!({}), &ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, OperationError::DeadlineExceeded { pending: None }));
        assert_eq!(started.elapsed(), Duration::from_secs(1));
        assert!(mock.submissions().is_empty());

        // The request was not abandoned
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(mock.submissions().len(), 1);
        mock.verify();
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_and_remote_failure_are_terminal() {
        let mut mock = MockRemote::new();
        mock.expect_poll().return_err(RemoteError::not_found("gone"));
        mock.expect_poll().return_status(OperationStatus::Failed("quota".into()));

        let ctx = CallContext::new(Verb::Delete, Duration::from_secs(60));
        let tracker = tracker(&mock);
        assert_eq!(tracker.wait(&handle(), &ctx).await.unwrap(), TerminalOutcome::NotFound);
        assert_eq!(
            tracker.wait(&handle(), &ctx).await.unwrap(),
            TerminalOutcome::FailedRemotely("quota".into())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_releases_caller_mid_poll() {
        let mut mock = MockRemote::new();
        mock.expect_poll()
            .after(Duration::from_secs(600))
            .return_status(OperationStatus::Succeeded);

        let ctx = CallContext::new(Verb::Update, Duration::from_secs(5));
        let started = Instant::now();
        let err = tracker(&mock).wait(&handle(), &ctx).await.unwrap_err();

        assert_eq!(started.elapsed(), Duration::from_secs(5));
        assert_eq!(err.pending(), Some(&handle()));
        assert!(matches!(err, OperationError::DeadlineExceeded { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_keeps_operation_observable() {
        let mut mock = MockRemote::new();
        mock.expect_poll().return_status(OperationStatus::InProgress);
        mock.expect_poll().return_status(OperationStatus::Succeeded);

        let ctx = CallContext::new(Verb::Create, Duration::from_secs(60));
        let tracker = tracker(&mock);
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            canceller.cancel();
        });

        let err = tracker.wait(&handle(), &ctx).await.unwrap_err();
        assert!(matches!(err, OperationError::Cancelled { pending: Some(_) }));

        let fresh = CallContext::new(Verb::Read, Duration::from_secs(60));
        let status = tracker.status(err.pending().unwrap(), &fresh).await.unwrap();
        assert_eq!(status, OperationStatus::Succeeded);
        mock.verify();
    }

    #[tokio::test]
    async fn test_synchronous_rejection_keeps_classification() {
        let mut mock = MockRemote::new();
        let locator = ResourceLocator::new("things", "a").within("group", "rg1");
        mock.expect_submit(MutationKind::Create)
            .return_err(RemoteError::conflict("name taken"));

        let ctx = CallContext::new(Verb::Create, Duration::from_secs(60));
        let err = tracker(&mock)
            .start(MutationKind::Create, &locator, serde_json::json!({}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(ErrorKind::from(err), ErrorKind::RequestRejected(_)));
    }

    #[test]
    fn test_interruption_reports_pending_token() {
        let kind = ErrorKind::from(OperationError::DeadlineExceeded {
            pending: Some(handle()),
        });
        assert_eq!(kind.to_string(), "deadline exceeded (operation op-1 still pending)");
    }
}
