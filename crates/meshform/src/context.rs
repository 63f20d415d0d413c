//! Shared command setup: resource file, controller, snapshot store

use anyhow::Context;
use meshform_cloud::{
    CloudError, DesiredConfig, HaState, ObservedState, Plan, Reconciler, RemoteOperations,
    StateFile, StateManager, StoredResource,
};
use meshform_config::ProviderSettings;
use meshform_config::settings::ENV_STATE_DIR;
use meshform_controller::ControllerClient;
use meshform_core::Manifest;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct Project {
    pub file: PathBuf,
    pub manifest: Manifest,
}

impl Project {
    pub fn load(file: Option<&Path>) -> anyhow::Result<Self> {
        let file = match file {
            Some(f) => f.to_path_buf(),
            None => meshform_config::find_resource_file()?,
        };
        let manifest = meshform_core::load_manifest(&file)
            .with_context(|| format!("failed to load {}", file.display()))?;
        debug!(file = %file.display(), resources = manifest.len(), "Project loaded");
        Ok(Self { file, manifest })
    }

    pub fn dir(&self) -> &Path {
        self.file.parent().unwrap_or(Path::new("."))
    }

    /// Resources matching `family/name`, or all of them
    pub fn select(&self, target: Option<&str>) -> anyhow::Result<Vec<&DesiredConfig>> {
        let Some(target) = target else {
            return Ok(self.manifest.resources.iter().collect());
        };
        let (family, name) = target
            .split_once('/')
            .ok_or_else(|| anyhow::anyhow!("target must be family/name, got '{target}'"))?;
        let resource = self.manifest.get(family, name).ok_or_else(|| {
            anyhow::anyhow!("{family} '{name}' is not declared in {}", self.file.display())
        })?;
        Ok(vec![resource])
    }

    /// Snapshot store location: settings, then `MESHFORM_STATE_DIR`, then
    /// `.meshform/` next to the resource file
    pub fn state_dir(&self, settings: Option<&ProviderSettings>) -> PathBuf {
        settings
            .and_then(|s| s.state_dir.clone())
            .or_else(|| std::env::var_os(ENV_STATE_DIR).map(PathBuf::from))
            .unwrap_or_else(|| self.dir().join(".meshform"))
    }

    pub fn state_manager(&self, settings: Option<&ProviderSettings>) -> StateManager {
        StateManager::new(self.state_dir(settings))
    }
}

/// Load provider settings and build a controller client
pub async fn connect() -> anyhow::Result<(ControllerClient, ProviderSettings)> {
    let settings = ProviderSettings::load()?;
    let client = ControllerClient::new(
        settings.controller_url.clone(),
        settings.username.clone(),
        settings.password.clone(),
        settings.verify_tls,
    )?;
    client
        .login()
        .await
        .with_context(|| format!("cannot log in to {}", settings.controller_url))?;
    Ok((client, settings))
}

/// Token cancelled on Ctrl-C
pub fn cancellation() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling remaining operations");
            child.cancel();
        }
    });
    token
}

/// A resource with its plan
pub struct Planned<'a> {
    pub desired: &'a DesiredConfig,
    pub reconciler: Reconciler<'static>,
    pub observed: Option<ObservedState>,
    pub plan: Plan,
}

/// Where current state comes from when planning
pub enum Source<'a> {
    Remote(&'a dyn RemoteOperations, &'a CancellationToken),
    Stored(&'a StateFile),
}

/// Plan every resource. Validation failures are printed and collected so
/// the whole file is checked in one go.
pub async fn plan_all<'a>(
    resources: &[&'a DesiredConfig],
    source: Source<'_>,
) -> anyhow::Result<Vec<Planned<'a>>> {
    let mut planned = Vec::with_capacity(resources.len());
    let mut invalid = 0;

    for desired in resources {
        let reconciler = Reconciler::for_config(desired)?;
        let observed = match &source {
            Source::Remote(remote, cancel) => {
                reconciler.read(*remote, desired.name(), cancel).await?
            }
            Source::Stored(state) => state
                .get(desired.family(), desired.name())
                .map(|stored| stored.state.clone()),
        };

        match reconciler.plan(observed.as_ref(), desired) {
            Ok(plan) => planned.push(Planned {
                desired,
                reconciler,
                observed,
                plan,
            }),
            Err(CloudError::Validation(violation)) => {
                crate::output::print_violations(desired, std::slice::from_ref(&violation));
                invalid += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if invalid > 0 {
        anyhow::bail!("{invalid} resource(s) failed validation");
    }
    Ok(planned)
}

/// Store what the controller reports now, or forget the resource if it is gone.
///
/// `remote_id` falls back to the previously stored id.
pub async fn record(
    state: &mut StateFile,
    reconciler: &Reconciler<'_>,
    remote: &dyn RemoteOperations,
    desired: &DesiredConfig,
    (remote_id, ha): (Option<String>, Option<HaState>),
    cancel: &CancellationToken,
) {
    let previous_id = state
        .get(desired.family(), desired.name())
        .and_then(|s| s.remote_id.clone());

    match reconciler.read(remote, desired.name(), cancel).await {
        Ok(Some(observed)) => {
            let stored = StoredResource::new(observed, desired.cloud_type())
                .with_remote_id(remote_id.or(previous_id))
                .with_ha(ha);
            state.set(stored);
        }
        Ok(None) => {
            state.remove(desired.family(), desired.name());
        }
        Err(e) => {
            warn!(
                family = desired.family(),
                name = desired.name(),
                error = %e,
                "Could not refresh snapshot"
            );
        }
    }
}
