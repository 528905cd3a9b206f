//! # Reconcile Demo
//!
//! Walks one Gremlin database and one Migrate project through their lifecycle against
//! the fake provider:
//!
//! 1. Create the database without throughput.
//! 2. Ask for throughput 400. The settings sub-resource was never provisioned, so the
//!    update succeeds with a warning.
//! 3. Refresh, then delete the database behind the engine's back and refresh again:
//!    the record is dropped from state.
//! 4. Create and destroy a project.
//!
//! ```bash
//! RUST_LOG=info cargo run -p reconcile-sample
//! RECONCILE_CONFIG=config.json RUST_LOG=debug cargo run -p reconcile-sample
//! ```

use reconcile_engine::{setup_tracing, EngineConfig, ResourceKind};
use reconcile_sample::kinds::{GremlinDatabaseKind, MigrateProjectKind};
use reconcile_sample::lifecycle::SampleSystem;
use reconcile_sample::model::{GremlinDatabase, MigrateProject};
use reconcile_sample::provider::ProviderConfig;
use tracing::{info, warn, Instrument};

const DATABASE: &str = "cosmosdb_gremlin_database.main";
const PROJECT: &str = "migrate_project.main";

fn load_config() -> Result<EngineConfig, String> {
    match std::env::var("RECONCILE_CONFIG") {
        Ok(path) => {
            let input = std::fs::read_to_string(&path).map_err(|e| format!("{path}: {e}"))?;
            EngineConfig::from_json(&input).map_err(|e| format!("{path}: {e}"))
        }
        Err(_) => Ok(EngineConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    let config = load_config()?;
    let dir = tempfile::tempdir().map_err(|e| e.to_string())?;
    let state_path = dir.path().join("reconcile.state.json");
    info!(state = %state_path.display(), "Starting demo");

    let mut system =
        SampleSystem::start(&state_path, ProviderConfig::default(), config).map_err(|e| e.to_string())?;

    let shutdown = system.workspace.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight operations");
            shutdown.cancel();
        }
    });

    let database = GremlinDatabase::new("graphdb", "demo-rg", "demo-account");

    let span = tracing::info_span!("database_lifecycle");
    async {
        system
            .workspace
            .apply::<GremlinDatabaseKind>(DATABASE, &database)
            .await
            .map_err(|e| e.to_string())?;

        let warnings = system
            .workspace
            .apply::<GremlinDatabaseKind>(DATABASE, &database.clone().with_throughput(400))
            .await
            .map_err(|e| e.to_string())?;
        for warning in &warnings {
            warn!(%warning, "Throughput not applied");
        }

        let observed = system
            .workspace
            .refresh::<GremlinDatabaseKind>(DATABASE)
            .await
            .map_err(|e| e.to_string())?;
        info!(?observed, "Refreshed");

        let identifier = GremlinDatabaseKind::locator(&database)
            .and_then(|locator| locator.encode())
            .map_err(|e| e.to_string())?;
        system.provider.remove(identifier).await.map_err(|e| e.to_string())?;

        let observed = system
            .workspace
            .refresh::<GremlinDatabaseKind>(DATABASE)
            .await
            .map_err(|e| e.to_string())?;
        info!(gone = observed.is_none(), "Refreshed after drift");
        Ok::<_, String>(())
    }
    .instrument(span)
    .await?;

    let project = MigrateProject::new("demo-project", "demo-rg", "westeurope").tag("env", "demo");
    let span = tracing::info_span!("project_lifecycle");
    async {
        system
            .workspace
            .apply::<MigrateProjectKind>(PROJECT, &project)
            .await
            .map_err(|e| e.to_string())?;
        system
            .workspace
            .destroy::<MigrateProjectKind>(PROJECT)
            .await
            .map_err(|e| e.to_string())
    }
    .instrument(span)
    .await?;

    info!(resources = system.workspace.addresses().count(), "State after demo");
    system.shutdown().await?;

    info!("Demo completed successfully");
    Ok(())
}
