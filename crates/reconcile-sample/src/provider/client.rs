//! # Provider Client
//!
//! The handle the engine talks to. It forwards each [`RemoteClient`] call to the
//! [`ProviderActor`](super::ProviderActor) over an mpsc channel and waits for the answer
//! on a oneshot channel.

use super::message::{Fault, ProviderRequest};
use async_trait::async_trait;
use reconcile_engine::{
    CallContext, MutationKind, OperationHandle, OperationStatus, Payload, RemoteClient, RemoteError, RemoteRecord,
    ResourceLocator, Submission,
};
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("provider actor closed")]
    ActorClosed,
    #[error("provider actor dropped the response")]
    ActorDropped,
}

impl From<ProviderError> for RemoteError {
    fn from(err: ProviderError) -> Self {
        RemoteError::unknown(err.to_string())
    }
}

/// Cheap to clone; the actor stops once every clone is dropped.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    sender: mpsc::Sender<ProviderRequest>,
}

impl ProviderClient {
    pub fn new(sender: mpsc::Sender<ProviderRequest>) -> Self {
        Self { sender }
    }

    /// Arms a fault for the next matching request.
    pub async fn inject(&self, fault: Fault) -> Result<(), ProviderError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(ProviderRequest::Inject { fault, respond_to })
            .await
            .map_err(|_| ProviderError::ActorClosed)?;
        response.await.map_err(|_| ProviderError::ActorDropped)
    }

    /// Deletes an object and its sub-resources out of band. Returns whether it existed.
    pub async fn remove(&self, identifier: impl Into<String>) -> Result<bool, ProviderError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(ProviderRequest::Remove {
                identifier: identifier.into(),
                respond_to,
            })
            .await
            .map_err(|_| ProviderError::ActorClosed)?;
        response.await.map_err(|_| ProviderError::ActorDropped)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, RemoteError>>) -> ProviderRequest,
    ) -> Result<T, RemoteError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(build(respond_to))
            .await
            .map_err(|_| ProviderError::ActorClosed)?;
        response.await.map_err(|_| ProviderError::ActorDropped)?
    }
}

#[async_trait]
impl RemoteClient for ProviderClient {
    async fn get(&self, locator: &ResourceLocator, _ctx: &CallContext) -> Result<RemoteRecord, RemoteError> {
        let identifier = locator.to_string();
        self.request(|respond_to| ProviderRequest::Get {
            identifier,
            respond_to,
        })
        .await
    }

    async fn submit(
        &self,
        kind: MutationKind,
        locator: &ResourceLocator,
        payload: Payload,
        _ctx: &CallContext,
    ) -> Result<Submission, RemoteError> {
        let identifier = locator.to_string();
        self.request(|respond_to| ProviderRequest::Submit {
            kind,
            identifier,
            payload,
            respond_to,
        })
        .await
    }

    async fn poll(&self, handle: &OperationHandle, _ctx: &CallContext) -> Result<OperationStatus, RemoteError> {
        let token = handle.token().to_string();
        self.request(|respond_to| ProviderRequest::Poll { token, respond_to })
            .await
    }
}
