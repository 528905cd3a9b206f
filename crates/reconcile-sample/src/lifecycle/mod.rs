//! # Lifecycle & Orchestration
//!
//! The layer above the engine that owns persisted state and wires the pieces together.
//!
//! - [`Workspace`] maps resource addresses to persisted state, drives the
//!   [`Reconciler`](reconcile_engine::Reconciler) verbs and writes the state file back
//!   after every change.
//! - [`SampleSystem`] starts the fake provider actor, opens a workspace against it and
//!   shuts both down in order.
//!
//! ## Serialization
//!
//! The engine does not lock anything per resource. A [`Workspace`] takes `&mut self`
//! for every verb, so all writes through one workspace are serialized. Independent
//! resources can still be reconciled in parallel by driving several
//! [`Reconciler`](reconcile_engine::Reconciler) clones directly.
//!
//! ## Graceful Shutdown
//!
//! 1. **Cancel** - the workspace's shutdown token is the parent of every verb's call
//!    context, so cancelling it releases any verb still waiting on the provider.
//! 2. **Drop clients** - closes the sender side of the provider channel.
//! 3. **Await** - the provider actor drains its queue, logs its final state and stops.
//!
//! ```rust
//! use reconcile_engine::EngineConfig;
//! use reconcile_sample::kinds::MigrateProjectKind;
//! use reconcile_sample::lifecycle::SampleSystem;
//! use reconcile_sample::model::MigrateProject;
//! use reconcile_sample::provider::ProviderConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dir = tempfile::tempdir()?;
//!     let provider = ProviderConfig { polls_to_complete: 0, ..Default::default() };
//!     let mut system = SampleSystem::start(dir.path().join("state.json"), provider, EngineConfig::default())?;
//!
//!     let project = MigrateProject::new("proj1", "rg1", "westeurope");
//!     system.workspace.apply::<MigrateProjectKind>("migrate_project.main", &project).await?;
//!     system.workspace.destroy::<MigrateProjectKind>("migrate_project.main").await?;
//!
//!     system.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod system;
mod workspace;

pub use system::SampleSystem;
pub use workspace::{StoredRecord, Workspace, WorkspaceError};
