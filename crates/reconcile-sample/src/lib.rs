//! # Reconcile Sample
//!
//! A concrete provider built on [`reconcile_engine`]:
//!
//! - **[model]**: desired configurations ([`GremlinDatabase`](model::GremlinDatabase),
//!   [`MigrateProject`](model::MigrateProject)).
//! - **[kinds]**: the [`ResourceKind`](reconcile_engine::ResourceKind) descriptors that
//!   map them onto identifiers, payloads and state upgraders.
//! - **[provider]**: an actor-backed in-memory control plane with long-running
//!   operations and fault injection.
//! - **[lifecycle]**: the state-file workspace and the system that wires it to the
//!   provider.

pub mod kinds;
pub mod lifecycle;
pub mod model;
pub mod provider;
