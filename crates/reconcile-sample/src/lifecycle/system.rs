use super::{Workspace, WorkspaceError};
use crate::provider::{self, ProviderClient, ProviderConfig};
use reconcile_engine::EngineConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// The fake provider plus a workspace wired to it.
pub struct SampleSystem {
    pub provider: ProviderClient,
    pub workspace: Workspace,
    handle: JoinHandle<()>,
}

impl SampleSystem {
    /// Starts the provider actor and opens the workspace at `state_path`.
    pub fn start(
        state_path: impl Into<PathBuf>,
        provider_config: ProviderConfig,
        engine_config: EngineConfig,
    ) -> Result<Self, WorkspaceError> {
        let (provider, handle) = provider::spawn(provider_config);
        let workspace = match Workspace::open(state_path, Arc::new(provider.clone()), engine_config) {
            Ok(workspace) => workspace,
            Err(e) => {
                handle.abort();
                return Err(e);
            }
        };
        Ok(Self {
            provider,
            workspace,
            handle,
        })
    }

    /// Cancels in-flight verbs, drops every client and waits for the provider to stop.
    pub async fn shutdown(self) -> Result<(), String> {
        info!("Shutting down");
        self.workspace.shutdown_token().cancel();
        drop(self.workspace);
        drop(self.provider);
        self.handle.await.map_err(|e| e.to_string())
    }
}
