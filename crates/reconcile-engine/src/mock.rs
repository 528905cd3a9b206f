//! # Mock Remote & Testing Guide
//!
//! [`MockRemote`] implements [`RemoteClient`] entirely in memory from a queue of
//! expectations. It lets you script exactly what the provider answers, including
//! failures that are hard to reproduce against a real provider (throttling, an
//! operation that never finishes, an object deleted mid-operation).
//!
//! ## When to use the mock vs the sample provider
//!
//! | Feature | MockRemote | Sample provider actor |
//! |---------|------------|-----------------------|
//! | **State** | None (scripted answers) | Real in-memory records |
//! | **Determinism** | Fully scripted | Subject to the scheduler |
//! | **Use case** | One verb's exact remote conversation | Multi-verb lifecycles |
//! | **Error injection** | Any answer, any point | Fault switches only |
//!
//! ## Example
//!
//! ```rust
//! use reconcile_engine::mock::MockRemote;
//! use reconcile_engine::{CallContext, RemoteClient, RemoteRecord, ResourceLocator, Verb};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut mock = MockRemote::new();
//!     mock.expect_get("/group/rg1/things/a")
//!         .return_ok(RemoteRecord::new("/group/rg1/things/a").with("size", 3));
//!
//!     let client = mock.client();
//!     let locator = ResourceLocator::new("things", "a").within("group", "rg1");
//!     let ctx = CallContext::new(Verb::Read, Duration::from_secs(5));
//!     let record = client.get(&locator, &ctx).await.unwrap();
//!     assert_eq!(record.property("size"), Some(&serde_json::json!(3)));
//!
//!     mock.verify();
//! }
//! ```
//!
//! Requests are matched strictly in order. A request that does not match the next
//! expectation (wrong call, wrong identifier, wrong mutation kind) panics, as does an
//! unexpected call once the queue is empty.

use crate::context::CallContext;
use crate::error::RemoteError;
use crate::locator::ResourceLocator;
use crate::operation::{OperationHandle, OperationStatus};
use crate::remote::{MutationKind, Payload, RemoteClient, RemoteRecord, Submission};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =============================================================================
// EXPECTATION BUILDER API
// =============================================================================

enum Expectation {
    Get {
        identifier: String,
        response: Result<RemoteRecord, RemoteError>,
    },
    Submit {
        kind: MutationKind,
        delay: Duration,
        response: Result<Submission, RemoteError>,
    },
    Poll {
        delay: Duration,
        response: Result<OperationStatus, RemoteError>,
    },
}

impl Expectation {
    fn describe(&self) -> String {
        match self {
            Expectation::Get { identifier, .. } => format!("get {identifier}"),
            Expectation::Submit { kind, .. } => format!("submit {kind}"),
            Expectation::Poll { .. } => "poll".to_string(),
        }
    }
}

/// A mutation the mock received, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSubmission {
    pub kind: MutationKind,
    pub identifier: String,
    pub payload: Payload,
}

type Queue = Arc<Mutex<VecDeque<Expectation>>>;

/// A scripted [`RemoteClient`]. Clones share one expectation queue.
#[derive(Clone, Default)]
pub struct MockRemote {
    expectations: Queue,
    submissions: Arc<Mutex<Vec<RecordedSubmission>>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the mock as a shareable client.
    pub fn client(&self) -> Arc<dyn RemoteClient> {
        Arc::new(self.clone())
    }

    /// Expects a `get` for the object whose identifier renders as `identifier`.
    pub fn expect_get(&mut self, identifier: impl Into<String>) -> GetExpectationBuilder {
        GetExpectationBuilder {
            identifier: identifier.into(),
            expectations: self.expectations.clone(),
        }
    }

    pub fn expect_submit(&mut self, kind: MutationKind) -> SubmitExpectationBuilder {
        SubmitExpectationBuilder {
            kind,
            delay: Duration::ZERO,
            expectations: self.expectations.clone(),
        }
    }

    pub fn expect_poll(&mut self) -> PollExpectationBuilder {
        PollExpectationBuilder {
            delay: Duration::ZERO,
            expectations: self.expectations.clone(),
        }
    }

    /// Every mutation received so far.
    pub fn submissions(&self) -> Vec<RecordedSubmission> {
        self.submissions.lock().unwrap().clone()
    }

    /// Verifies that all expectations were met.
    pub fn verify(&self) {
        let exps = self.expectations.lock().unwrap();
        if !exps.is_empty() {
            let remaining: Vec<String> = exps.iter().map(Expectation::describe).collect();
            panic!("Not all expectations were met. {} remaining: {:?}", exps.len(), remaining);
        }
    }

    fn next(&self, request: &str) -> Expectation {
        let mut exps = self.expectations.lock().unwrap();
        match exps.pop_front() {
            Some(expectation) => expectation,
            None => panic!("Unexpected request: {request}"),
        }
    }
}

#[async_trait]
impl RemoteClient for MockRemote {
    async fn get(&self, locator: &ResourceLocator, _ctx: &CallContext) -> Result<RemoteRecord, RemoteError> {
        let requested = locator.to_string();
        match self.next(&format!("get {requested}")) {
            Expectation::Get { identifier, response } if identifier == requested => response,
            other => panic!("Expectation mismatch: expected {}, got get {requested}", other.describe()),
        }
    }

    async fn submit(
        &self,
        kind: MutationKind,
        locator: &ResourceLocator,
        payload: Payload,
        _ctx: &CallContext,
    ) -> Result<Submission, RemoteError> {
        let (delay, response) = match self.next(&format!("submit {kind} {locator}")) {
            Expectation::Submit {
                kind: expected,
                delay,
                response,
            } if expected == kind => (delay, response),
            other => panic!("Expectation mismatch: expected {}, got submit {kind}", other.describe()),
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.submissions.lock().unwrap().push(RecordedSubmission {
            kind,
            identifier: locator.to_string(),
            payload,
        });
        response
    }

    async fn poll(&self, handle: &OperationHandle, _ctx: &CallContext) -> Result<OperationStatus, RemoteError> {
        match self.next(&format!("poll {handle}")) {
            Expectation::Poll { delay, response } => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                response
            }
            other => panic!("Expectation mismatch: expected {}, got poll {handle}", other.describe()),
        }
    }
}

/// Builder for `get` expectations.
pub struct GetExpectationBuilder {
    identifier: String,
    expectations: Queue,
}

impl GetExpectationBuilder {
    pub fn return_ok(self, record: RemoteRecord) {
        self.push(Ok(record));
    }

    pub fn return_not_found(self) {
        let message = format!("{} was not found", self.identifier);
        self.push(Err(RemoteError::not_found(message)));
    }

    pub fn return_err(self, error: RemoteError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<RemoteRecord, RemoteError>) {
        let mut exps = self.expectations.lock().unwrap();
        exps.push_back(Expectation::Get {
            identifier: self.identifier,
            response,
        });
    }
}

/// Builder for `submit` expectations.
pub struct SubmitExpectationBuilder {
    kind: MutationKind,
    delay: Duration,
    expectations: Queue,
}

impl SubmitExpectationBuilder {
    /// Answers only after `delay`. The submission is recorded once answered.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn return_completed(self) {
        self.push(Ok(Submission::Completed));
    }

    /// Answers with a long-running operation identified by `token`.
    pub fn return_accepted(self, token: impl Into<String>) {
        let handle = OperationHandle::new(token, self.kind);
        self.push(Ok(Submission::Accepted(handle)));
    }

    pub fn return_err(self, error: RemoteError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<Submission, RemoteError>) {
        let mut exps = self.expectations.lock().unwrap();
        exps.push_back(Expectation::Submit {
            kind: self.kind,
            delay: self.delay,
            response,
        });
    }
}

/// Builder for `poll` expectations.
pub struct PollExpectationBuilder {
    delay: Duration,
    expectations: Queue,
}

impl PollExpectationBuilder {
    /// Holds the answer back for `delay`, simulating a slow status endpoint.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn return_status(self, status: OperationStatus) {
        self.push(Ok(status));
    }

    pub fn return_err(self, error: RemoteError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<OperationStatus, RemoteError>) {
        let mut exps = self.expectations.lock().unwrap();
        exps.push_back(Expectation::Poll {
            delay: self.delay,
            response,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Verb;
    use serde_json::json;

    fn ctx() -> CallContext {
        CallContext::new(Verb::Create, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_mock_remote_with_expectations() {
        let mut mock = MockRemote::new();
        let locator = ResourceLocator::new("things", "a").within("group", "rg1");

        mock.expect_get("/group/rg1/things/a").return_not_found();
        mock.expect_submit(MutationKind::Create).return_accepted("op-1");
        mock.expect_poll().return_status(OperationStatus::Succeeded);

        let client = mock.client();
        let err = client.get(&locator, &ctx()).await.unwrap_err();
        assert!(err.is_not_found());

        let submitted = client
            .submit(MutationKind::Create, &locator, json!({ "size": 3 }), &ctx())
            .await
            .unwrap();
        let Submission::Accepted(handle) = submitted else {
            panic!("expected a long-running operation");
        };
        assert_eq!(handle.token(), "op-1");
        assert_eq!(client.poll(&handle, &ctx()).await.unwrap(), OperationStatus::Succeeded);

        assert_eq!(
            mock.submissions(),
            vec![RecordedSubmission {
                kind: MutationKind::Create,
                identifier: "/group/rg1/things/a".into(),
                payload: json!({ "size": 3 }),
            }]
        );
        mock.verify();
    }

    #[tokio::test]
    #[should_panic(expected = "Not all expectations were met")]
    async fn test_verify_reports_unmet_expectations() {
        let mut mock = MockRemote::new();
        mock.expect_poll().return_status(OperationStatus::InProgress);
        mock.verify();
    }

    #[tokio::test]
    #[should_panic(expected = "Expectation mismatch")]
    async fn test_wrong_identifier_panics() {
        let mut mock = MockRemote::new();
        mock.expect_get("/group/rg1/things/b").return_not_found();
        let locator = ResourceLocator::new("things", "a").within("group", "rg1");
        let _ = mock.get(&locator, &ctx()).await;
    }
}
