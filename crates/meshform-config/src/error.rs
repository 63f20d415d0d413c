use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config directory not found")]
    ConfigDirNotFound,

    #[error(
        "resource file not found. Looked in:\n\
        - current directory: meshform.local.kdl, .meshform.local.kdl, meshform.kdl, .meshform.kdl\n\
        - ./.meshform/\n\
        - ~/.config/meshform/meshform.kdl\n\
        Set MESHFORM_CONFIG_PATH or pass --file to point at one directly"
    )]
    ResourceFileNotFound,

    #[error("missing setting '{name}'\nhint: set it in {path} or export {env}")]
    MissingSetting {
        name: &'static str,
        env: &'static str,
        path: PathBuf,
    },

    #[error("invalid setting '{name}': {message}")]
    InvalidSetting { name: &'static str, message: String },

    #[error("failed to parse settings file {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
