//! # Fake Provider Actor
//!
//! An in-memory stand-in for a cloud control plane. It owns every remote record and
//! processes requests sequentially in its own task, so no locking is needed around the
//! store.
//!
//! ## Behavior
//!
//! * **Create** is create-or-update (PUT): it never fails because the object exists.
//!   A `throughput` in the payload provisions the `throughputSettings/default`
//!   sub-resource; without one the sub-resource never exists.
//! * **Update** and **Delete** of a missing object are refused synchronously with
//!   `NotFound`.
//! * Accepted mutations complete after [`ProviderConfig::polls_to_complete`] polls and
//!   are applied at completion, so an object removed in the meantime makes the
//!   operation end in `NotFound`. With zero polls mutations complete synchronously.
//! * Finished operations keep their outcome, so a later status check still answers.
//!   Only the most recent [`ProviderConfig::retained_operations`] outcomes are kept;
//!   older tokens are forgotten and polling them fails like any unknown token.

use super::message::{Fault, ProviderRequest};
use super::ProviderClient;
use reconcile_engine::{
    MutationKind, OperationHandle, OperationStatus, Payload, RemoteError, RemoteRecord, Submission,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const THROUGHPUT_SETTINGS: &str = "throughputSettings/default";
const THROUGHPUT: &str = "throughput";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub polls_to_complete: u32,
    pub buffer_size: usize,
    pub retained_operations: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            polls_to_complete: 2,
            buffer_size: 32,
            retained_operations: 64,
        }
    }
}

struct Operation {
    kind: MutationKind,
    identifier: String,
    payload: Payload,
    polls_left: u32,
    failure: Option<String>,
    outcome: Option<Result<OperationStatus, RemoteError>>,
}

pub struct ProviderActor {
    receiver: mpsc::Receiver<ProviderRequest>,
    config: ProviderConfig,
    records: BTreeMap<String, RemoteRecord>,
    operations: HashMap<String, Operation>,
    finished: VecDeque<String>,
    next_operation: u32,
    reject_next: Option<RemoteError>,
    omit_identifier: bool,
    fail_next: Option<String>,
}

impl ProviderActor {
    /// Creates the actor and a client connected to it. The actor does nothing until
    /// [`run`](Self::run) is spawned.
    pub fn new(config: ProviderConfig) -> (Self, ProviderClient) {
        let (sender, receiver) = mpsc::channel(config.buffer_size.max(1));
        let actor = Self {
            receiver,
            config,
            records: BTreeMap::new(),
            operations: HashMap::new(),
            finished: VecDeque::new(),
            next_operation: 1,
            reject_next: None,
            omit_identifier: false,
            fail_next: None,
        };
        (actor, ProviderClient::new(sender))
    }

    /// Processes requests until every client is dropped.
    pub async fn run(mut self) {
        info!(polls_to_complete = self.config.polls_to_complete, "Provider started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                ProviderRequest::Get {
                    identifier,
                    respond_to,
                } => {
                    let result = self.get(&identifier);
                    debug!(%identifier, found = result.is_ok(), "Get");
                    let _ = respond_to.send(result);
                }
                ProviderRequest::Submit {
                    kind,
                    identifier,
                    payload,
                    respond_to,
                } => {
                    debug!(%kind, %identifier, ?payload, "Submit");
                    let result = self.submit(kind, identifier, payload);
                    if let Err(e) = &result {
                        warn!(%kind, error = %e, "Submit refused");
                    }
                    let _ = respond_to.send(result);
                }
                ProviderRequest::Poll { token, respond_to } => {
                    let result = self.poll(&token);
                    debug!(%token, ?result, "Poll");
                    let _ = respond_to.send(result);
                }
                ProviderRequest::Inject { fault, respond_to } => {
                    info!(?fault, "Fault injected");
                    match fault {
                        Fault::RejectNext(e) => self.reject_next = Some(e),
                        Fault::OmitIdentifier => self.omit_identifier = true,
                        Fault::FailNextOperation(cause) => self.fail_next = Some(cause),
                    }
                    let _ = respond_to.send(());
                }
                ProviderRequest::Remove {
                    identifier,
                    respond_to,
                } => {
                    let removed = remove_tree(&mut self.records, &identifier);
                    info!(%identifier, removed, "Removed out of band");
                    let _ = respond_to.send(removed);
                }
            }
        }

        info!(records = self.records.len(), "Provider shutdown");
    }

    fn get(&mut self, identifier: &str) -> Result<RemoteRecord, RemoteError> {
        let mut record = self
            .records
            .get(identifier)
            .cloned()
            .ok_or_else(|| not_found(identifier))?;
        if std::mem::take(&mut self.omit_identifier) {
            record.id = None;
        }
        Ok(record)
    }

    fn submit(&mut self, kind: MutationKind, identifier: String, payload: Payload) -> Result<Submission, RemoteError> {
        if let Some(e) = self.reject_next.take() {
            return Err(e);
        }
        if kind != MutationKind::Create && !self.records.contains_key(&identifier) {
            return Err(not_found(&identifier));
        }
        let failure = self.fail_next.take();

        if self.config.polls_to_complete == 0 {
            if let Some(cause) = failure {
                return Err(RemoteError::rejected(cause));
            }
            apply(&mut self.records, kind, &identifier, &payload)?;
            return Ok(Submission::Completed);
        }

        let token = format!("op-{}", self.next_operation);
        self.next_operation += 1;
        self.operations.insert(
            token.clone(),
            Operation {
                kind,
                identifier,
                payload,
                polls_left: self.config.polls_to_complete,
                failure,
                outcome: None,
            },
        );
        Ok(Submission::Accepted(OperationHandle::new(token, kind)))
    }

    fn poll(&mut self, token: &str) -> Result<OperationStatus, RemoteError> {
        let Some(operation) = self.operations.get_mut(token) else {
            return Err(RemoteError::unknown(format!("unknown operation {token}")));
        };
        if let Some(outcome) = &operation.outcome {
            return outcome.clone();
        }
        operation.polls_left = operation.polls_left.saturating_sub(1);
        if operation.polls_left > 0 {
            return Ok(OperationStatus::InProgress);
        }

        let outcome = match operation.failure.take() {
            Some(cause) => Ok(OperationStatus::Failed(cause)),
            None => apply(
                &mut self.records,
                operation.kind,
                &operation.identifier,
                &operation.payload,
            ),
        };
        operation.outcome = Some(outcome.clone());
        self.retire(token);
        outcome
    }

    /// Keeps the outcome of `token` around for later checks, forgetting the oldest
    /// finished operations beyond the retention limit.
    fn retire(&mut self, token: &str) {
        self.finished.push_back(token.to_string());
        while self.finished.len() > self.config.retained_operations {
            if let Some(oldest) = self.finished.pop_front() {
                self.operations.remove(&oldest);
                debug!(token = %oldest, "Forgot finished operation");
            }
        }
    }
}

fn not_found(identifier: &str) -> RemoteError {
    RemoteError::not_found(format!("{identifier} does not exist"))
}

/// Applies a finished mutation to the store.
fn apply(
    records: &mut BTreeMap<String, RemoteRecord>,
    kind: MutationKind,
    identifier: &str,
    payload: &Payload,
) -> Result<OperationStatus, RemoteError> {
    let properties = payload.as_object().cloned().unwrap_or_default();
    match kind {
        MutationKind::Create => {
            let mut record = records
                .remove(identifier)
                .unwrap_or_else(|| RemoteRecord::new(identifier));
            for (name, value) in properties {
                if name != THROUGHPUT {
                    record.properties.insert(name, value);
                } else if !value.is_null() {
                    let settings = format!("{identifier}/{THROUGHPUT_SETTINGS}");
                    let child = RemoteRecord::new(settings.clone()).with(THROUGHPUT, value);
                    records.insert(settings, child);
                }
            }
            info!(%identifier, "Created");
            records.insert(identifier.to_string(), record);
        }
        MutationKind::Update => {
            let record = records.get_mut(identifier).ok_or_else(|| not_found(identifier))?;
            record.properties.extend(properties);
            info!(%identifier, "Updated");
        }
        MutationKind::Delete => {
            if !remove_tree(records, identifier) {
                return Err(not_found(identifier));
            }
            info!(%identifier, size = records.len(), "Deleted");
        }
    }
    Ok(OperationStatus::Succeeded)
}

/// Removes a record and every sub-resource nested under it.
fn remove_tree(records: &mut BTreeMap<String, RemoteRecord>, identifier: &str) -> bool {
    let prefix = format!("{identifier}/");
    records.retain(|key, _| !key.starts_with(&prefix));
    records.remove(identifier).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    const DB: &str = "/resourceGroups/rg1/databaseAccounts/acct1/gremlinDatabases/db1";

    fn actor(polls_to_complete: u32) -> ProviderActor {
        let (actor, _client) = ProviderActor::new(ProviderConfig {
            polls_to_complete,
            ..Default::default()
        });
        actor
    }

    fn accepted_token(submission: Submission) -> String {
        match submission {
            Submission::Accepted(handle) => handle.token().to_string(),
            Submission::Completed => panic!("expected a long-running operation"),
        }
    }

    #[test]
    fn test_operation_applies_on_completing_poll() {
        let mut provider = actor(2);
        let token = accepted_token(
            provider
                .submit(MutationKind::Create, DB.into(), json!({ "name": "db1", "throughput": 400 }))
                .unwrap(),
        );
        assert!(provider.get(DB).unwrap_err().is_not_found());

        assert_eq!(provider.poll(&token).unwrap(), OperationStatus::InProgress);
        assert_eq!(provider.poll(&token).unwrap(), OperationStatus::Succeeded);
        // outcome is sticky
        assert_eq!(provider.poll(&token).unwrap(), OperationStatus::Succeeded);

        assert_eq!(provider.get(DB).unwrap().property("name"), Some(&json!("db1")));
        let settings = provider.get(&format!("{DB}/throughputSettings/default")).unwrap();
        assert_eq!(settings.property("throughput"), Some(&json!(400)));
    }

    #[test]
    fn test_throughput_settings_only_exist_when_provisioned() {
        let mut provider = actor(0);
        provider
            .submit(MutationKind::Create, DB.into(), json!({ "name": "db1" }))
            .unwrap();
        let settings = format!("{DB}/throughputSettings/default");
        assert!(provider.get(&settings).unwrap_err().is_not_found());
        assert!(provider
            .submit(MutationKind::Update, settings, json!({ "throughput": 400 }))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_delete_removes_sub_resources() {
        let mut provider = actor(0);
        provider
            .submit(MutationKind::Create, DB.into(), json!({ "name": "db1", "throughput": 400 }))
            .unwrap();
        assert_eq!(
            provider.submit(MutationKind::Delete, DB.into(), Value::Null).unwrap(),
            Submission::Completed
        );
        assert!(provider.records.is_empty());
        assert!(provider
            .submit(MutationKind::Delete, DB.into(), Value::Null)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_vanished_target_ends_operation_not_found() {
        let mut provider = actor(0);
        provider
            .submit(MutationKind::Create, DB.into(), json!({ "name": "db1" }))
            .unwrap();
        provider.config.polls_to_complete = 1;
        let token = accepted_token(
            provider
                .submit(MutationKind::Update, DB.into(), json!({ "label": "x" }))
                .unwrap(),
        );
        remove_tree(&mut provider.records, DB);
        assert!(provider.poll(&token).unwrap_err().is_not_found());
    }

    #[test]
    fn test_only_recent_outcomes_are_retained() {
        let (mut provider, _client) = ProviderActor::new(ProviderConfig {
            polls_to_complete: 1,
            retained_operations: 2,
            ..Default::default()
        });
        let tokens: Vec<String> = (1..=3)
            .map(|i| {
                let id = format!("/resourceGroups/rg1/migrateProjects/p{i}");
                let token = accepted_token(provider.submit(MutationKind::Create, id, json!({})).unwrap());
                assert_eq!(provider.poll(&token).unwrap(), OperationStatus::Succeeded);
                token
            })
            .collect();

        assert_eq!(provider.operations.len(), 2);
        assert!(provider.poll(&tokens[0]).is_err());
        assert_eq!(provider.poll(&tokens[1]).unwrap(), OperationStatus::Succeeded);
        assert_eq!(provider.poll(&tokens[2]).unwrap(), OperationStatus::Succeeded);
        assert_eq!(provider.operations.len(), 2);
    }

    #[test]
    fn test_faults_apply_once() {
        let mut provider = actor(1);
        provider.reject_next = Some(RemoteError::conflict("busy"));
        provider.fail_next = Some("quota exceeded".into());

        let err = provider
            .submit(MutationKind::Create, DB.into(), json!({ "name": "db1" }))
            .unwrap_err();
        assert_eq!(err, RemoteError::conflict("busy"));

        let token = accepted_token(
            provider
                .submit(MutationKind::Create, DB.into(), json!({ "name": "db1" }))
                .unwrap(),
        );
        assert_eq!(
            provider.poll(&token).unwrap(),
            OperationStatus::Failed("quota exceeded".into())
        );

        let token = accepted_token(
            provider
                .submit(MutationKind::Create, DB.into(), json!({ "name": "db1" }))
                .unwrap(),
        );
        assert_eq!(provider.poll(&token).unwrap(), OperationStatus::Succeeded);

        provider.omit_identifier = true;
        assert_eq!(provider.get(DB).unwrap().id, None);
        assert_eq!(provider.get(DB).unwrap().id.as_deref(), Some(DB));
    }
}
