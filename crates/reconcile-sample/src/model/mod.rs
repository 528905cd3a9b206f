//! Desired configurations of the sample resource kinds, as a declarative front-end
//! would hand them to the engine.

pub mod gremlin_database;
pub mod migrate_project;

pub use gremlin_database::GremlinDatabase;
pub use migrate_project::MigrateProject;
