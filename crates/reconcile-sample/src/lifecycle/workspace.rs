//! # State-File Workspace
//!
//! The front-end harness that owns persisted state. Each managed resource lives at an
//! address (for example `gremlin_database.main`) and is stored in a JSON state file as
//! its kind, schema version and raw state record:
//!
//! ```json
//! {
//!   "version": 1,
//!   "resources": {
//!     "gremlin_database.main": {
//!       "kind": "cosmosdb_gremlin_database",
//!       "schema_version": 1,
//!       "state": { "identifier": "/resourceGroups/...", "schema_version": 1, "last_known_attributes": {} }
//!     }
//!   }
//! }
//! ```
//!
//! Raw records are upgraded through the kind's migrator every time a verb loads them,
//! so files written by older versions keep working. Every change is written back
//! atomically (temp file in the same directory, then rename).

use reconcile_engine::{
    CallContext, EngineConfig, PersistedState, ReadOutcome, ReconcileError, Reconciler, RemoteClient, ResourceKind,
    Verb, Warning,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const STATE_FILE_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("state file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("state file is invalid: {0}")]
    StateFile(#[from] serde_json::Error),
    #[error("state file could not be replaced: {0}")]
    Persist(#[from] tempfile::PersistError),
    #[error("unsupported state file version {0}")]
    UnsupportedFileVersion(u32),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error("no resource is managed at {0}")]
    UnknownAddress(String),
    #[error("{0} is already managed")]
    AddressInUse(String),
    #[error("{address} holds a {found}, not a {expected}")]
    KindMismatch {
        address: String,
        expected: &'static str,
        found: String,
    },
}

/// One resource as written to the state file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub kind: String,
    pub schema_version: u32,
    pub state: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    version: u32,
    #[serde(default)]
    resources: BTreeMap<String, StoredRecord>,
}

pub struct Workspace {
    path: PathBuf,
    records: BTreeMap<String, StoredRecord>,
    remote: Arc<dyn RemoteClient>,
    config: EngineConfig,
    shutdown: CancellationToken,
}

impl Workspace {
    /// Opens the state file at `path`, starting empty if it does not exist yet.
    pub fn open(
        path: impl Into<PathBuf>,
        remote: Arc<dyn RemoteClient>,
        config: EngineConfig,
    ) -> Result<Self, WorkspaceError> {
        let path = path.into();
        let records = match std::fs::read(&path) {
            Ok(bytes) => {
                let file: StateFile = serde_json::from_slice(&bytes)?;
                if file.version != STATE_FILE_VERSION {
                    return Err(WorkspaceError::UnsupportedFileVersion(file.version));
                }
                file.resources
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        info!(path = %path.display(), resources = records.len(), "Workspace opened");

        Ok(Self {
            path,
            records,
            remote,
            config,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cancelling this token aborts every in-flight verb of the workspace.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn record(&self, address: &str) -> Option<&StoredRecord> {
        self.records.get(address)
    }

    /// The upgraded state at `address`, if it holds a `K`.
    pub fn state<K: ResourceKind>(&self, address: &str) -> Result<Option<PersistedState>, WorkspaceError> {
        self.load(address, &self.reconciler::<K>(), Verb::Read)
    }

    /// Creates the resource if the address is empty, otherwise converges it to
    /// `desired`. Warnings are returned next to the successful result.
    pub async fn apply<K: ResourceKind>(
        &mut self,
        address: &str,
        desired: &K::Desired,
    ) -> Result<Vec<Warning>, WorkspaceError> {
        let reconciler = self.reconciler::<K>();
        match self.load(address, &reconciler, Verb::Update)? {
            None => {
                let ctx = self.context(&reconciler, Verb::Create);
                let state = reconciler.create(desired, &ctx).await?;
                self.store::<K>(address, &state)?;
                Ok(Vec::new())
            }
            Some(state) => {
                let ctx = self.context(&reconciler, Verb::Update);
                let applied = reconciler.update(&state, desired, &ctx).await?;
                for warning in &applied.warnings {
                    warn!(%address, %warning, "Applied with warning");
                }
                self.store::<K>(address, &applied.state)?;
                Ok(applied.warnings)
            }
        }
    }

    /// Reads the remote object back. Drift that removed the object drops the record
    /// and returns `None`.
    pub async fn refresh<K: ResourceKind>(&mut self, address: &str) -> Result<Option<K::Desired>, WorkspaceError> {
        let reconciler = self.reconciler::<K>();
        let state = self
            .load(address, &reconciler, Verb::Read)?
            .ok_or_else(|| WorkspaceError::UnknownAddress(address.to_string()))?;
        let ctx = self.context(&reconciler, Verb::Read);
        match reconciler.read(&state, &ctx).await? {
            ReadOutcome::Present { state, observed } => {
                self.store::<K>(address, &state)?;
                Ok(Some(observed))
            }
            ReadOutcome::Absent => {
                info!(%address, "Removing from state");
                self.records.remove(address);
                self.save()?;
                Ok(None)
            }
        }
    }

    pub async fn destroy<K: ResourceKind>(&mut self, address: &str) -> Result<(), WorkspaceError> {
        let reconciler = self.reconciler::<K>();
        let state = self
            .load(address, &reconciler, Verb::Delete)?
            .ok_or_else(|| WorkspaceError::UnknownAddress(address.to_string()))?;
        let ctx = self.context(&reconciler, Verb::Delete);
        reconciler.delete(&state, &ctx).await?;
        info!(%address, "Removing from state");
        self.records.remove(address);
        self.save()
    }

    /// Brings an existing remote object under management at an empty address.
    pub async fn import<K: ResourceKind>(&mut self, address: &str, identifier: &str) -> Result<(), WorkspaceError> {
        if self.records.contains_key(address) {
            return Err(WorkspaceError::AddressInUse(address.to_string()));
        }
        let reconciler = self.reconciler::<K>();
        let ctx = self.context(&reconciler, Verb::Import);
        let state = reconciler.import(identifier, &ctx).await?;
        self.store::<K>(address, &state)
    }

    /// Writes every record to the state file, replacing it atomically.
    pub fn save(&self) -> Result<(), WorkspaceError> {
        let file = StateFile {
            version: STATE_FILE_VERSION,
            resources: self.records.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&file)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(&bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path)?;
        debug!(path = %self.path.display(), resources = self.records.len(), "State saved");
        Ok(())
    }

    fn reconciler<K: ResourceKind>(&self) -> Reconciler<K> {
        Reconciler::new(Arc::clone(&self.remote), self.config.clone())
    }

    fn context<K: ResourceKind>(&self, reconciler: &Reconciler<K>, verb: Verb) -> CallContext {
        reconciler.context(verb).with_parent(&self.shutdown)
    }

    /// The upgraded state at `address`. Failures are reported against `verb`.
    fn load<K: ResourceKind>(
        &self,
        address: &str,
        reconciler: &Reconciler<K>,
        verb: Verb,
    ) -> Result<Option<PersistedState>, WorkspaceError> {
        let Some(record) = self.records.get(address) else {
            return Ok(None);
        };
        if record.kind != K::TYPE_NAME {
            return Err(WorkspaceError::KindMismatch {
                address: address.to_string(),
                expected: K::TYPE_NAME,
                found: record.kind.clone(),
            });
        }
        let state = reconciler.upgrade(record.state.clone(), record.schema_version, verb)?;
        if state.schema_version != record.schema_version {
            debug!(%address, from = record.schema_version, to = state.schema_version, "State upgraded");
        }
        Ok(Some(state))
    }

    fn store<K: ResourceKind>(&mut self, address: &str, state: &PersistedState) -> Result<(), WorkspaceError> {
        let record = StoredRecord {
            kind: K::TYPE_NAME.to_string(),
            schema_version: state.schema_version,
            state: serde_json::to_value(state)?,
        };
        self.records.insert(address.to_string(), record);
        self.save()
    }
}
