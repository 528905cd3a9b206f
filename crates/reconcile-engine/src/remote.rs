//! # Remote API Client
//!
//! The collaborator contract the engine drives. Implementations own transport, auth
//! and any retry policy; the engine only sees classified [`RemoteError`]s.

use crate::context::CallContext;
use crate::error::RemoteError;
use crate::locator::ResourceLocator;
use crate::operation::{OperationHandle, OperationStatus};
use crate::state::Attributes;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Request body of a mutation.
pub type Payload = Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// The provider's current representation of one object. Never cached across passes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Canonical identifier, when the provider reports one.
    pub id: Option<String>,
    #[serde(default)]
    pub properties: Attributes,
}

impl RemoteRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            properties: Attributes::new(),
        }
    }

    /// A record whose provider response carried no identifier.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        crate::state::set_value(&self.properties, name)
    }
}

/// Synchronous answer to a submitted mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The mutation took effect before the response was sent.
    Completed,
    /// The mutation continues remotely; poll the handle for the outcome.
    Accepted(OperationHandle),
}

#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn get(&self, locator: &ResourceLocator, ctx: &CallContext) -> Result<RemoteRecord, RemoteError>;

    async fn submit(
        &self,
        kind: MutationKind,
        locator: &ResourceLocator,
        payload: Payload,
        ctx: &CallContext,
    ) -> Result<Submission, RemoteError>;

    /// One status check of a long-running operation. A `NotFound` error means the
    /// object the operation targeted no longer exists.
    async fn poll(&self, handle: &OperationHandle, ctx: &CallContext) -> Result<OperationStatus, RemoteError>;
}
