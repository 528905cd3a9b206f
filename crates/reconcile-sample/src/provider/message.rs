//! # Provider Messages
//!
//! Requests sent from a [`ProviderClient`](super::ProviderClient) to the
//! [`ProviderActor`](super::ProviderActor). The first three variants mirror the
//! [`RemoteClient`](reconcile_engine::RemoteClient) contract; the rest are test and demo
//! controls that a real provider would not expose.

use reconcile_engine::{MutationKind, OperationStatus, Payload, RemoteError, RemoteRecord, Submission};
use tokio::sync::oneshot;

/// One-shot response channel carrying a classified provider answer.
pub type Response<T> = oneshot::Sender<Result<T, RemoteError>>;

/// A failure to inject into the next matching request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The next submission is refused synchronously with this error.
    RejectNext(RemoteError),
    /// The next lookup answers without an identifier.
    OmitIdentifier,
    /// The next accepted operation finishes with this remote failure.
    FailNextOperation(String),
}

#[derive(Debug)]
pub enum ProviderRequest {
    Get {
        identifier: String,
        respond_to: Response<RemoteRecord>,
    },
    Submit {
        kind: MutationKind,
        identifier: String,
        payload: Payload,
        respond_to: Response<Submission>,
    },
    Poll {
        token: String,
        respond_to: Response<OperationStatus>,
    },
    Inject {
        fault: Fault,
        respond_to: oneshot::Sender<()>,
    },
    /// Deletes an object (and its sub-resources) behind the engine's back.
    Remove {
        identifier: String,
        respond_to: oneshot::Sender<bool>,
    },
}
