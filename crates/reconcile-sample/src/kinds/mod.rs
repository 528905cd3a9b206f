//! [`ResourceKind`](reconcile_engine::ResourceKind) descriptors for the sample kinds.

pub mod gremlin_database;
pub mod migrate_project;

pub use gremlin_database::GremlinDatabaseKind;
pub use migrate_project::MigrateProjectKind;
