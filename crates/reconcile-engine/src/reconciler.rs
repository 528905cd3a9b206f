//! # Generic Reconciler
//!
//! Drives one resource instance through its lifecycle:
//!
//! ```text
//! Absent --create--> Present --update--> Present --delete--> Absent
//!    ^                  |
//!    +------read--------+   (remote object gone: drift correction)
//! ```
//!
//! Each verb is one independent sequential call. The reconciler holds no per-resource
//! state between calls; the caller owns the [`PersistedState`] and must serialize
//! writes to any one logical resource. Calls for different resources are independent
//! and may run in parallel on clones of the same reconciler.
//!
//! ## Failure policy
//!
//! - Identifier and migration failures, `AlreadyExists` and `IdentifierUnavailable`
//!   are surfaced as-is. Nothing is retried inside the engine.
//! - `NotFound` on Read means the object is gone ([`ReadOutcome::Absent`]); on Delete
//!   it means the delete already happened.
//! - A setting whose sub-resource does not exist cannot be updated; that is reported
//!   as a [`Warning`] next to an otherwise successful update.

use crate::config::{EngineConfig, ImportMode};
use crate::context::{CallContext, Interrupted};
use crate::error::{ErrorKind, MigrationError, ReconcileError, Verb};
use crate::kind::ResourceKind;
use crate::locator::ResourceLocator;
use crate::migration::StateMigrator;
use crate::operation::{OperationError, OperationTracker, TerminalOutcome};
use crate::remote::{MutationKind, Payload, RemoteClient, RemoteRecord, Submission};
use crate::state::{set_value, Attributes, PersistedState};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A recoverable condition reported alongside a successful verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    AttributeNotProvisionable { attribute: String, reason: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::AttributeNotProvisionable { attribute, reason } => {
                write!(f, "{attribute} could not be configured: {reason}")
            }
        }
    }
}

/// Result of a successful update.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub state: PersistedState,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome<D> {
    Present { state: PersistedState, observed: D },
    /// The remote object no longer exists; the caller should drop its record.
    Absent,
}

pub struct Reconciler<K: ResourceKind> {
    remote: Arc<dyn RemoteClient>,
    tracker: OperationTracker,
    config: EngineConfig,
    migrator: StateMigrator,
    _kind: PhantomData<fn() -> K>,
}

impl<K: ResourceKind> Clone for Reconciler<K> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
            tracker: self.tracker.clone(),
            config: self.config.clone(),
            migrator: self.migrator.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K: ResourceKind> Reconciler<K> {
    pub fn new(remote: Arc<dyn RemoteClient>, config: EngineConfig) -> Self {
        let tracker = OperationTracker::new(Arc::clone(&remote), config.polling.clone());
        Self {
            remote,
            tracker,
            config,
            migrator: K::migrator(),
            _kind: PhantomData,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tracker(&self) -> &OperationTracker {
        &self.tracker
    }

    pub fn state_version(&self) -> u32 {
        self.migrator.current_version()
    }

    /// A fresh call context using the configured timeout for `verb`.
    pub fn context(&self, verb: Verb) -> CallContext {
        CallContext::new(verb, self.config.timeouts.for_verb(verb))
    }

    /// Runs the migrator over a raw state record. Must happen before any other verb
    /// sees the record; failures are reported against `verb`, the verb that loaded it.
    pub fn upgrade(&self, raw: Value, declared_version: u32, verb: Verb) -> Result<PersistedState, ReconcileError> {
        let resource = raw
            .get("identifier")
            .or_else(|| raw.get("id"))
            .and_then(Value::as_str)
            .unwrap_or("<unknown>")
            .to_string();
        self.migrator
            .migrate(raw, declared_version)
            .map_err(|e| ReconcileError::new(verb, resource, e))
    }

    #[instrument(skip_all, fields(kind = K::TYPE_NAME, verb = "create"))]
    pub async fn create(&self, desired: &K::Desired, ctx: &CallContext) -> Result<PersistedState, ReconcileError> {
        let locator = K::locator(desired).map_err(|e| ReconcileError::new(Verb::Create, format!("{desired:?}"), e))?;
        let resource = locator.to_string();
        let fail = |kind: ErrorKind| ReconcileError::new(Verb::Create, resource.as_str(), kind);
        let expected = locator.encode().map_err(|e| fail(e.into()))?;

        if self.config.import_mode == ImportMode::Reject {
            if let Some(existing) = self.lookup(&locator, ctx).await.map_err(fail)? {
                let identifier = existing.id.unwrap_or(expected);
                warn!(%identifier, "Already exists");
                return Err(fail(ErrorKind::AlreadyExists { identifier }));
            }
        }

        debug!(?desired, "Create");
        match self
            .mutate(MutationKind::Create, &locator, K::create_payload(desired), ctx)
            .await
            .map_err(|e| fail(e.into()))?
        {
            TerminalOutcome::Succeeded => {}
            TerminalOutcome::FailedRemotely(cause) => return Err(fail(ErrorKind::OperationFailed(cause))),
            TerminalOutcome::NotFound => return Err(fail(ErrorKind::VanishedDuringOperation)),
        }

        let record = self
            .lookup(&locator, ctx)
            .await
            .map_err(fail)?
            .ok_or_else(|| fail(ErrorKind::IdentifierUnavailable))?;
        let identifier = match record.id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(fail(ErrorKind::IdentifierUnavailable)),
        };
        let minted = K::FORMAT.decode(&identifier).map_err(|e| fail(e.into()))?;
        let attributes = self.observe(&minted, &record, ctx).await.map_err(fail)?;

        info!(%identifier, "Created");
        Ok(PersistedState::new(identifier, self.state_version(), attributes))
    }

    #[instrument(skip_all, fields(kind = K::TYPE_NAME, verb = "read", identifier = %state.identifier))]
    pub async fn read(
        &self,
        state: &PersistedState,
        ctx: &CallContext,
    ) -> Result<ReadOutcome<K::Desired>, ReconcileError> {
        let fail = |kind: ErrorKind| ReconcileError::new(Verb::Read, state.identifier.as_str(), kind);
        self.check_version(state).map_err(fail)?;
        let locator = K::FORMAT.decode(&state.identifier).map_err(|e| fail(e.into()))?;

        let Some(record) = self.lookup(&locator, ctx).await.map_err(fail)? else {
            info!("Not found remotely, removing from state");
            return Ok(ReadOutcome::Absent);
        };
        let attributes = self.observe(&locator, &record, ctx).await.map_err(fail)?;
        let observed = serde_json::from_value(Value::Object(attributes.clone()))
            .map_err(|e| fail(ErrorKind::InvalidState(e.to_string())))?;

        debug!(?observed, "Read");
        Ok(ReadOutcome::Present {
            state: PersistedState::new(state.identifier.clone(), self.state_version(), attributes),
            observed,
        })
    }

    #[instrument(skip_all, fields(kind = K::TYPE_NAME, verb = "update", identifier = %state.identifier))]
    pub async fn update(
        &self,
        state: &PersistedState,
        desired: &K::Desired,
        ctx: &CallContext,
    ) -> Result<Applied, ReconcileError> {
        let fail = |kind: ErrorKind| ReconcileError::new(Verb::Update, state.identifier.as_str(), kind);
        self.check_version(state).map_err(fail)?;
        let current = K::FORMAT.decode(&state.identifier).map_err(|e| fail(e.into()))?;
        let wanted_locator = K::locator(desired).map_err(|e| fail(e.into()))?;
        if let Some(kind) = replacement(&current, &wanted_locator) {
            return Err(fail(kind));
        }

        let wanted = desired_attributes::<K>(desired).map_err(fail)?;
        let known = &state.last_known_attributes;
        let settings = K::settings();
        let base_changed = wanted
            .keys()
            .chain(known.keys())
            .filter(|name| !settings.iter().any(|s| s.attribute == name.as_str()))
            .any(|name| set_value(&wanted, name) != set_value(known, name));

        if base_changed {
            debug!(?desired, "Updating base object");
            self.expect_success(MutationKind::Update, &current, K::update_payload(desired), ctx)
                .await
                .map_err(fail)?;
        }

        let mut warnings = Vec::new();
        for setting in settings {
            let Some(value) = set_value(&wanted, setting.attribute) else {
                continue;
            };
            if set_value(known, setting.attribute) == Some(value) {
                continue;
            }
            debug!(attribute = setting.attribute, %value, "Updating setting");
            let target = setting.locator(&current);
            let outcome = self
                .mutate(MutationKind::Update, &target, K::setting_payload(setting, value), ctx)
                .await;
            let reason = match outcome {
                Ok(TerminalOutcome::Succeeded) => continue,
                Ok(TerminalOutcome::FailedRemotely(cause)) => return Err(fail(ErrorKind::OperationFailed(cause))),
                Ok(TerminalOutcome::NotFound) => format!("{target} does not exist"),
                Err(OperationError::Rejected(e)) if e.is_not_found() => e.message,
                Err(e) => return Err(fail(e.into())),
            };
            warn!(attribute = setting.attribute, %reason, "Setting is not provisionable");
            warnings.push(Warning::AttributeNotProvisionable {
                attribute: setting.attribute.to_string(),
                reason,
            });
        }

        let record = self
            .lookup(&current, ctx)
            .await
            .map_err(fail)?
            .ok_or_else(|| fail(ErrorKind::VanishedDuringOperation))?;
        let attributes = self.observe(&current, &record, ctx).await.map_err(fail)?;

        info!(warnings = warnings.len(), "Updated");
        Ok(Applied {
            state: PersistedState::new(state.identifier.clone(), self.state_version(), attributes),
            warnings,
        })
    }

    #[instrument(skip_all, fields(kind = K::TYPE_NAME, verb = "delete", identifier = %state.identifier))]
    pub async fn delete(&self, state: &PersistedState, ctx: &CallContext) -> Result<(), ReconcileError> {
        let fail = |kind: ErrorKind| ReconcileError::new(Verb::Delete, state.identifier.as_str(), kind);
        self.check_version(state).map_err(fail)?;
        let locator = K::FORMAT.decode(&state.identifier).map_err(|e| fail(e.into()))?;

        match self
            .mutate(MutationKind::Delete, &locator, Value::Null, ctx)
            .await
        {
            Ok(TerminalOutcome::Succeeded) => info!("Deleted"),
            Ok(TerminalOutcome::NotFound) => info!("Already gone"),
            Err(OperationError::Rejected(e)) if e.is_not_found() => info!("Already gone"),
            Ok(TerminalOutcome::FailedRemotely(cause)) => return Err(fail(ErrorKind::OperationFailed(cause))),
            Err(e) => return Err(fail(e.into())),
        }
        Ok(())
    }

    /// Adopts an existing remote object into state. The identifier is validated
    /// against the kind's format before any remote call.
    #[instrument(skip_all, fields(kind = K::TYPE_NAME, verb = "import", identifier = %identifier))]
    pub async fn import(&self, identifier: &str, ctx: &CallContext) -> Result<PersistedState, ReconcileError> {
        let fail = |kind: ErrorKind| ReconcileError::new(Verb::Import, identifier, kind);
        let locator = K::FORMAT.decode(identifier).map_err(|e| fail(e.into()))?;

        let record = match ctx.run(self.remote.get(&locator, ctx)).await {
            Ok(Ok(record)) => record,
            Ok(Err(e)) => return Err(fail(ErrorKind::from_remote(e))),
            Err(reason) => return Err(fail(interrupted(reason))),
        };
        let attributes = self.observe(&locator, &record, ctx).await.map_err(fail)?;

        info!("Imported");
        Ok(PersistedState::new(identifier, self.state_version(), attributes))
    }

    fn check_version(&self, state: &PersistedState) -> Result<(), ErrorKind> {
        let current = self.state_version();
        if state.schema_version > current {
            return Err(MigrationError::UnsupportedStateVersion {
                found: state.schema_version,
                current,
            }
            .into());
        }
        if state.schema_version < current {
            return Err(ErrorKind::InvalidState(format!(
                "state is at version {} and must be migrated to {current} first",
                state.schema_version
            )));
        }
        Ok(())
    }

    async fn lookup(&self, locator: &ResourceLocator, ctx: &CallContext) -> Result<Option<RemoteRecord>, ErrorKind> {
        match ctx.run(self.remote.get(locator, ctx)).await {
            Ok(Ok(record)) => Ok(Some(record)),
            Ok(Err(e)) if e.is_not_found() => Ok(None),
            Ok(Err(e)) => Err(ErrorKind::from_remote(e)),
            Err(reason) => Err(interrupted(reason)),
        }
    }

    /// Flattens the base record and fills in every setting from its sub-resource. A
    /// missing sub-resource leaves the setting unset.
    async fn observe(
        &self,
        locator: &ResourceLocator,
        record: &RemoteRecord,
        ctx: &CallContext,
    ) -> Result<Attributes, ErrorKind> {
        let mut attributes = K::flatten(locator, record);
        for setting in K::settings() {
            let value = self
                .lookup(&setting.locator(locator), ctx)
                .await?
                .and_then(|sub| sub.property(setting.field).cloned());
            match value {
                Some(value) => {
                    attributes.insert(setting.attribute.to_string(), value);
                }
                None => {
                    debug!(attribute = setting.attribute, "Setting not present");
                    attributes.remove(setting.attribute);
                }
            }
        }
        Ok(attributes)
    }

    async fn mutate(
        &self,
        kind: MutationKind,
        locator: &ResourceLocator,
        payload: Payload,
        ctx: &CallContext,
    ) -> Result<TerminalOutcome, OperationError> {
        match self.tracker.start(kind, locator, payload, ctx).await? {
            Submission::Completed => Ok(TerminalOutcome::Succeeded),
            Submission::Accepted(handle) => {
                debug!(operation = %handle, "Waiting for completion");
                self.tracker.wait(&handle, ctx).await
            }
        }
    }

    async fn expect_success(
        &self,
        kind: MutationKind,
        locator: &ResourceLocator,
        payload: Payload,
        ctx: &CallContext,
    ) -> Result<(), ErrorKind> {
        match self.mutate(kind, locator, payload, ctx).await? {
            TerminalOutcome::Succeeded => Ok(()),
            TerminalOutcome::FailedRemotely(cause) => Err(ErrorKind::OperationFailed(cause)),
            TerminalOutcome::NotFound => Err(ErrorKind::VanishedDuringOperation),
        }
    }
}

fn interrupted(reason: Interrupted) -> ErrorKind {
    match reason {
        Interrupted::DeadlineExceeded => ErrorKind::DeadlineExceeded { operation: None },
        Interrupted::Cancelled => ErrorKind::Cancelled { operation: None },
    }
}

fn desired_attributes<K: ResourceKind>(desired: &K::Desired) -> Result<Attributes, ErrorKind> {
    match serde_json::to_value(desired) {
        Ok(Value::Object(attributes)) => Ok(attributes),
        Ok(other) => Err(ErrorKind::InvalidState(format!(
            "desired configuration must serialize to an object, got {other}"
        ))),
        Err(e) => Err(ErrorKind::InvalidState(e.to_string())),
    }
}

/// The locator fields are immutable: a change needs a new resource.
fn replacement(current: &ResourceLocator, wanted: &ResourceLocator) -> Option<ErrorKind> {
    if current.name != wanted.name {
        return Some(ErrorKind::RequiresReplacement {
            field: "name",
            current: current.name.clone(),
            desired: wanted.name.clone(),
        });
    }
    if current.scope != wanted.scope {
        let render = |l: &ResourceLocator| -> String {
            l.scope.iter().map(|s| format!("/{}/{}", s.kind, s.value)).collect()
        };
        return Some(ErrorKind::RequiresReplacement {
            field: "scope",
            current: render(current),
            desired: render(wanted),
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replacement_names_the_changed_field() {
        let current = ResourceLocator::new("things", "a").within("group", "rg1");
        assert!(replacement(&current, &current.clone()).is_none());

        let renamed = ResourceLocator::new("things", "b").within("group", "rg1");
        assert!(matches!(
            replacement(&current, &renamed),
            Some(ErrorKind::RequiresReplacement { field: "name", .. })
        ));

        let moved = ResourceLocator::new("things", "a").within("group", "rg2");
        let Some(ErrorKind::RequiresReplacement { field, current, desired }) = replacement(&current, &moved) else {
            panic!("expected a replacement");
        };
        assert_eq!(field, "scope");
        assert_eq!(current, "/group/rg1");
        assert_eq!(desired, "/group/rg2");
    }

    #[test]
    fn test_warning_display() {
        let warning = Warning::AttributeNotProvisionable {
            attribute: "throughput".into(),
            reason: "not provisioned at creation".into(),
        };
        assert_eq!(
            warning.to_string(),
            "throughput could not be configured: not provisioned at creation"
        );
    }
}
