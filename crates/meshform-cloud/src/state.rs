//! Snapshot store
//!
//! The engine is stateless between passes. Callers that want to remember the
//! last observed state (the CLI does, for `plan` without a controller round
//! trip and for `refresh`) keep it in `<state_dir>/state.json`.

use crate::capability::CloudType;
use crate::error::{CloudError, Result};
use crate::ha::HaState;
use crate::record::ObservedState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

const STATE_VERSION: u32 = 1;
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const LOCK_FILE: &str = "lock.json";

/// Every stored snapshot, keyed `family:name`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    pub resources: BTreeMap<String, StoredResource>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

impl StateFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(family: &str, name: &str) -> String {
        format!("{family}:{name}")
    }

    pub fn get(&self, family: &str, name: &str) -> Option<&StoredResource> {
        self.resources.get(&Self::key(family, name))
    }

    /// Add or replace a snapshot
    pub fn set(&mut self, resource: StoredResource) {
        let key = Self::key(resource.state.family(), resource.state.name());
        self.resources.insert(key, resource);
        self.updated_at = Utc::now();
    }

    /// Forget a resource, e.g. after the controller reported it gone
    pub fn remove(&mut self, family: &str, name: &str) -> Option<StoredResource> {
        let removed = self.resources.remove(&Self::key(family, name));
        if removed.is_some() {
            self.updated_at = Utc::now();
        }
        removed
    }

    pub fn by_family<'a>(&'a self, family: &'a str) -> impl Iterator<Item = &'a StoredResource> {
        self.resources
            .values()
            .filter(move |r| r.state.family() == family)
    }
}

/// Last observed state of one resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResource {
    pub state: ObservedState,

    pub cloud_type: CloudType,

    /// Id returned when the resource was created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,

    /// HA state the last pass settled in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ha: Option<HaState>,

    pub updated_at: DateTime<Utc>,
}

impl StoredResource {
    pub fn new(state: ObservedState, cloud_type: CloudType) -> Self {
        Self {
            state,
            cloud_type,
            remote_id: None,
            ha: None,
            updated_at: Utc::now(),
        }
    }

    pub fn with_remote_id(mut self, id: Option<String>) -> Self {
        self.remote_id = id;
        self
    }

    pub fn with_ha(mut self, ha: Option<HaState>) -> Self {
        self.ha = ha;
        self
    }
}

/// Reads and writes the state file
pub struct StateManager {
    state_dir: PathBuf,
}

impl StateManager {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            state_dir: state_dir.as_ref().to_path_buf(),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    fn state_path(&self) -> PathBuf {
        self.state_dir.join(STATE_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir.join(STATE_BACKUP)
    }

    fn lock_path(&self) -> PathBuf {
        self.state_dir.join(LOCK_FILE)
    }

    async fn ensure_state_dir(&self) -> Result<()> {
        if !self.state_dir.exists() {
            fs::create_dir_all(&self.state_dir).await?;
            tracing::debug!("Created state directory: {}", self.state_dir.display());
        }
        Ok(())
    }

    /// Load the state file, or an empty state when there is none yet
    pub async fn load(&self) -> Result<StateFile> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!("State file not found, starting empty");
            return Ok(StateFile::new());
        }

        let content = fs::read_to_string(&path).await?;
        let state: StateFile = serde_json::from_str(&content)?;

        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "state file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!("Loaded state with {} resources", state.resources.len());
        Ok(state)
    }

    /// Write the state file, keeping the previous one as a backup
    pub async fn save(&self, state: &StateFile) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let backup = self.backup_path();

        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
        }

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&path, content).await?;

        tracing::debug!("Saved state with {} resources", state.resources.len());
        Ok(())
    }

    /// Acquire the advisory lock. Locks older than an hour are taken over.
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        self.ensure_state_dir().await?;

        let lock_path = self.lock_path();

        if lock_path.exists() {
            let content = fs::read_to_string(&lock_path).await?;
            let lock_info: LockInfo = serde_json::from_str(&content)?;

            let age = Utc::now().signed_duration_since(lock_info.acquired_at);
            if age.num_hours() < 1 {
                return Err(CloudError::LockError(format!(
                    "state is locked by {} since {}",
                    lock_info.holder, lock_info.acquired_at
                )));
            }

            tracing::warn!("Removing stale lock from {}", lock_info.holder);
        }

        let lock_info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            acquired_at: Utc::now(),
        };

        let content = serde_json::to_string_pretty(&lock_info)?;
        fs::write(&lock_path, content).await?;

        tracing::debug!("Acquired state lock");
        Ok(StateLock {
            lock_path,
            released: false,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    acquired_at: DateTime<Utc>,
}

/// Held while a command mutates the state file
#[derive(Debug)]
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
