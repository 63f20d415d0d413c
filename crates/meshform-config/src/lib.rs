pub mod error;
pub mod settings;

pub use error::*;
pub use settings::{ProviderSettings, RawSettings, settings_path};

use std::path::PathBuf;
use tracing::debug;

pub const ENV_CONFIG_PATH: &str = "MESHFORM_CONFIG_PATH";

const CANDIDATES: [&str; 4] = [
    "meshform.local.kdl",
    ".meshform.local.kdl",
    "meshform.kdl",
    ".meshform.kdl",
];

/// Meshform's global config directory, created on first use
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("meshform");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Find the project's resource file
///
/// Search order:
/// 1. `MESHFORM_CONFIG_PATH`
/// 2. current directory: meshform.local.kdl, .meshform.local.kdl, meshform.kdl, .meshform.kdl
/// 3. `./.meshform/`, same order
/// 4. `~/.config/meshform/meshform.kdl`
pub fn find_resource_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(ENV_CONFIG_PATH) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            debug!(path = %path.display(), "Resource file from {}", ENV_CONFIG_PATH);
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;

    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let project_dir = current_dir.join(".meshform");
    if project_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = project_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("meshform").join("meshform.kdl");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::ResourceFileNotFound)
}
