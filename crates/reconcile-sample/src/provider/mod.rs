//! # Fake Remote Provider
//!
//! An actor-backed, in-memory control plane implementing
//! [`RemoteClient`](reconcile_engine::RemoteClient). It gives the demo and the tests a
//! provider with real asynchrony: accepted mutations, polling, out-of-band drift and
//! injectable faults.
//!
//! ```rust
//! use reconcile_sample::provider::{self, ProviderConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (client, handle) = provider::spawn(ProviderConfig::default());
//!     assert!(!client.remove("/resourceGroups/rg1/migrateProjects/p1").await.unwrap());
//!     drop(client);
//!     handle.await.unwrap();
//! }
//! ```

mod actor;
mod client;
pub mod message;

pub use actor::{ProviderActor, ProviderConfig};
pub use client::{ProviderClient, ProviderError};
pub use message::Fault;

use tokio::task::JoinHandle;

/// Creates the provider actor and its client without starting it.
pub fn new(config: ProviderConfig) -> (ProviderActor, ProviderClient) {
    ProviderActor::new(config)
}

/// Starts the provider on the current runtime.
pub fn spawn(config: ProviderConfig) -> (ProviderClient, JoinHandle<()>) {
    let (actor, client) = new(config);
    let handle = tokio::spawn(actor.run());
    (client, handle)
}
