//! # Reconcile Engine
//!
//! A generic reconciliation engine for declaratively managed remote resources. A caller
//! holds a desired configuration and a locally persisted record; the engine converges
//! the remote object toward the desired configuration through four verbs (Create,
//! Read, Update, Delete) and hands back the refreshed record.
//!
//! ## Architecture Overview
//!
//! The engine separates concerns into four components:
//!
//! 1. **Identifier Codec** ([`ResourceLocator`], [`IdentifierFormat`]) - converts the
//!    opaque persisted identifier to and from a structured locator.
//! 2. **State Version Migrator** ([`StateMigrator`]) - upgrades records written by older
//!    versions before anything else looks at them.
//! 3. **Long-Running Operation Tracker** ([`OperationTracker`]) - holds the caller until
//!    an asynchronous remote mutation reaches a terminal outcome, honoring the call's
//!    deadline and cancellation.
//! 4. **Reconciler** ([`Reconciler`]) - the per-verb state machine, written once and
//!    parameterized by a small per-kind descriptor ([`ResourceKind`]).
//!
//! The provider itself sits behind the [`RemoteClient`] trait and is injected into the
//! reconciler; nothing is resolved from global state.
//!
//! ## Example
//!
//! ```rust
//! use reconcile_engine::mock::MockRemote;
//! use reconcile_engine::{
//!     Attributes, EngineConfig, IdError, IdentifierFormat, MutationKind, Payload, Reconciler,
//!     RemoteRecord, ResourceKind, ResourceLocator, Verb,
//! };
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Debug, Serialize, Deserialize)]
//! struct Bucket {
//!     name: String,
//!     group: String,
//! }
//!
//! struct BucketKind;
//!
//! impl ResourceKind for BucketKind {
//!     const TYPE_NAME: &'static str = "bucket";
//!     const FORMAT: IdentifierFormat = IdentifierFormat::new(&["group"], "buckets");
//!     type Desired = Bucket;
//!
//!     fn locator(desired: &Bucket) -> Result<ResourceLocator, IdError> {
//!         Self::FORMAT.locator(&[&desired.group], &desired.name)
//!     }
//!     fn create_payload(_: &Bucket) -> Payload {
//!         serde_json::json!({})
//!     }
//!     fn flatten(locator: &ResourceLocator, _: &RemoteRecord) -> Attributes {
//!         let mut attributes = Attributes::new();
//!         attributes.insert("name".into(), locator.name.clone().into());
//!         attributes.insert("group".into(), locator.scope[0].value.clone().into());
//!         attributes
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let id = "/group/rg1/buckets/logs";
//!     let mut mock = MockRemote::new();
//!     mock.expect_get(id).return_not_found();
//!     mock.expect_submit(MutationKind::Create).return_completed();
//!     mock.expect_get(id).return_ok(RemoteRecord::new(id));
//!
//!     let reconciler = Reconciler::<BucketKind>::new(mock.client(), EngineConfig::default());
//!     let desired = Bucket { name: "logs".into(), group: "rg1".into() };
//!     let state = reconciler.create(&desired, &reconciler.context(Verb::Create)).await.unwrap();
//!     assert_eq!(state.identifier, id);
//!     mock.verify();
//! }
//! ```
//!
//! ## Concurrency Model
//!
//! - Each verb is one sequential call; the reconciler keeps no per-resource state.
//! - Calls for different resources are independent and can run in parallel on clones
//!   of one reconciler.
//! - Calls for the same resource must be serialized by the caller. The import-safety
//!   lookup before Create is a best-effort guard, not a compare-and-swap.
//!
//! ## Testing
//!
//! The [`mock`] module provides [`mock::MockRemote`], a scripted [`RemoteClient`] for
//! exercising one verb's exact conversation with the provider.

pub mod config;
pub mod context;
pub mod error;
pub mod kind;
pub mod locator;
pub mod logging;
pub mod migration;
pub mod mock;
pub mod operation;
pub mod reconciler;
pub mod remote;
pub mod state;

// Re-export core types for convenience
pub use config::{EngineConfig, ImportMode, PollPolicy, Timeouts};
pub use context::{CallContext, Interrupted};
pub use error::{ErrorClass, ErrorKind, IdError, MigrationError, ReconcileError, RemoteError, Verb};
pub use kind::{ResourceKind, Setting};
pub use locator::{IdentifierFormat, ResourceLocator, Segment};
pub use logging::{setup_tracing, try_setup_tracing};
pub use migration::{StateMigrator, StateUpgrader};
pub use operation::{OperationError, OperationHandle, OperationStatus, OperationTracker, TerminalOutcome};
pub use reconciler::{Applied, ReadOutcome, Reconciler, Warning};
pub use remote::{MutationKind, Payload, RemoteClient, RemoteRecord, Submission};
pub use state::{Attributes, PersistedState};
