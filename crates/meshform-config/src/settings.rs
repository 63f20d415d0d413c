//! Provider settings
//!
//! Read from `<config_dir>/meshform/provider.yaml`, then overridden by
//! `MESHFORM_*` environment variables.
//!
//! ```yaml
//! controller_url: https://controller.example.com
//! username: admin
//! password: hunter2
//! verify_tls: true
//! state_dir: /var/lib/meshform
//! ```

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const SETTINGS_FILE: &str = "provider.yaml";

pub const ENV_CONTROLLER_URL: &str = "MESHFORM_CONTROLLER_URL";
pub const ENV_USERNAME: &str = "MESHFORM_USERNAME";
pub const ENV_PASSWORD: &str = "MESHFORM_PASSWORD";
pub const ENV_SKIP_TLS_VERIFY: &str = "MESHFORM_SKIP_TLS_VERIFY";
pub const ENV_STATE_DIR: &str = "MESHFORM_STATE_DIR";

/// Settings as they appear in the file, every key optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawSettings {
    pub controller_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub verify_tls: Option<bool>,
    pub state_dir: Option<PathBuf>,
}

impl RawSettings {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay values from `lookup`, normally the process environment.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = lookup(ENV_CONTROLLER_URL) {
            self.controller_url = Some(url);
        }
        if let Some(username) = lookup(ENV_USERNAME) {
            self.username = Some(username);
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            self.password = Some(password);
        }
        if let Some(skip) = lookup(ENV_SKIP_TLS_VERIFY) {
            let skip = parse_flag(&skip).ok_or_else(|| ConfigError::InvalidSetting {
                name: "verify_tls",
                message: format!("{ENV_SKIP_TLS_VERIFY} must be true or false, got '{skip}'"),
            })?;
            self.verify_tls = Some(!skip);
        }
        if let Some(dir) = lookup(ENV_STATE_DIR) {
            self.state_dir = Some(PathBuf::from(dir));
        }
        Ok(self)
    }

    /// Check mandatory values. `source` is only used in error messages.
    pub fn resolve(self, source: &Path) -> Result<ProviderSettings> {
        let missing = |name, env| ConfigError::MissingSetting {
            name,
            env,
            path: source.to_path_buf(),
        };

        let controller_url = self
            .controller_url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| missing("controller_url", ENV_CONTROLLER_URL))?;
        let controller_url =
            url::Url::parse(&controller_url).map_err(|e| ConfigError::InvalidSetting {
                name: "controller_url",
                message: e.to_string(),
            })?;
        let username = self
            .username
            .filter(|u| !u.is_empty())
            .ok_or_else(|| missing("username", ENV_USERNAME))?;
        let password = self
            .password
            .ok_or_else(|| missing("password", ENV_PASSWORD))?;

        Ok(ProviderSettings {
            controller_url,
            username,
            password,
            verify_tls: self.verify_tls.unwrap_or(true),
            state_dir: self.state_dir,
        })
    }
}

/// Resolved settings for talking to the controller
#[derive(Clone)]
pub struct ProviderSettings {
    pub controller_url: url::Url,
    pub username: String,
    pub password: String,
    pub verify_tls: bool,
    pub state_dir: Option<PathBuf>,
}

impl ProviderSettings {
    /// Load from the default settings file and the environment.
    /// A missing file is fine as long as the environment covers it.
    pub fn load() -> Result<Self> {
        let path = settings_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = if path.is_file() {
            debug!(path = %path.display(), "Reading provider settings");
            RawSettings::from_file(path)?
        } else {
            debug!(path = %path.display(), "No settings file, using environment only");
            RawSettings::default()
        };
        raw.with_env(|key| std::env::var(key).ok())?.resolve(path)
    }

    /// Where the snapshot store lives, `default` when unset
    pub fn state_dir_or(&self, default: impl Into<PathBuf>) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(|| default.into())
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("controller_url", &self.controller_url.as_str())
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("verify_tls", &self.verify_tls)
            .field("state_dir", &self.state_dir)
            .finish()
    }
}

/// `<config_dir>/meshform/provider.yaml`
pub fn settings_path() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("meshform")
        .join(SETTINGS_FILE))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use std::fs;

    fn env<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        move |key| map.get(key).map(|v| v.to_string())
    }

    #[test]
    fn test_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(
            &path,
            "controller_url: https://ctrl.example.com\nusername: admin\npassword: secret\nverify_tls: false\n",
        )
        .unwrap();

        let settings = RawSettings::from_file(&path)
            .unwrap()
            .with_env(env(&[]))
            .unwrap()
            .resolve(&path)
            .unwrap();
        assert_eq!(settings.controller_url.as_str(), "https://ctrl.example.com/");
        assert_eq!(settings.username, "admin");
        assert!(!settings.verify_tls);
        assert_eq!(settings.state_dir_or("/tmp/state"), PathBuf::from("/tmp/state"));
    }

    #[test]
    fn test_env_overrides_file() {
        let raw = RawSettings {
            controller_url: Some("https://file.example.com".into()),
            username: Some("file-user".into()),
            password: Some("file-pass".into()),
            verify_tls: Some(true),
            state_dir: None,
        };
        let settings = raw
            .with_env(env(&[
                (ENV_USERNAME, "env-user"),
                (ENV_SKIP_TLS_VERIFY, "yes"),
                (ENV_STATE_DIR, "/srv/meshform"),
            ]))
            .unwrap()
            .resolve(Path::new("provider.yaml"))
            .unwrap();
        assert_eq!(settings.controller_url.host_str(), Some("file.example.com"));
        assert_eq!(settings.username, "env-user");
        assert!(!settings.verify_tls);
        assert_eq!(settings.state_dir, Some(PathBuf::from("/srv/meshform")));
    }

    #[test]
    fn test_missing_setting() {
        let raw = RawSettings {
            controller_url: Some("https://ctrl.example.com".into()),
            ..Default::default()
        };
        let err = raw.resolve(Path::new("provider.yaml")).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingSetting {
                name: "username",
                env: ENV_USERNAME,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_values() {
        let err = RawSettings::default()
            .with_env(env(&[(ENV_SKIP_TLS_VERIFY, "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSetting { name: "verify_tls", .. }));

        let raw = RawSettings {
            controller_url: Some("not a url".into()),
            username: Some("admin".into()),
            password: Some("pw".into()),
            ..Default::default()
        };
        assert!(matches!(
            raw.resolve(Path::new("provider.yaml")),
            Err(ConfigError::InvalidSetting { name: "controller_url", .. })
        ));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "controler_url: https://typo.example.com\n").unwrap();
        assert!(matches!(
            RawSettings::from_file(&path),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn test_password_not_in_debug() {
        let settings = RawSettings {
            controller_url: Some("https://ctrl.example.com".into()),
            username: Some("admin".into()),
            password: Some("hunter2".into()),
            ..Default::default()
        }
        .resolve(Path::new("provider.yaml"))
        .unwrap();
        let debug = format!("{settings:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    #[serial]
    fn test_load_from_environment_only() {
        let dir = tempfile::tempdir().unwrap();
        temp_env::with_vars(
            [
                (ENV_CONTROLLER_URL, Some("https://env.example.com")),
                (ENV_USERNAME, Some("admin")),
                (ENV_PASSWORD, Some("pw")),
                (ENV_SKIP_TLS_VERIFY, None),
                (ENV_STATE_DIR, None),
            ],
            || {
                let settings =
                    ProviderSettings::load_from(&dir.path().join(SETTINGS_FILE)).unwrap();
                assert_eq!(settings.controller_url.host_str(), Some("env.example.com"));
                assert!(settings.verify_tls);
            },
        );
    }
}
