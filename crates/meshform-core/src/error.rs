use meshform_cloud::CloudError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("KDL parse error: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {path}\nreason: {message}")]
    IoError { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("template error: {file}\nreason: {message}")]
    TemplateError { file: PathBuf, message: String },

    #[error("template render error: {0}")]
    TemplateRenderError(String),

    #[error("unknown resource family '{0}'\nhint: run `meshform families` for the supported list")]
    UnknownFamily(String),

    #[error("resource '{family}' is missing a name")]
    MissingName { family: String },

    #[error("resource {family} '{name}' is declared more than once")]
    DuplicateResource { family: String, name: String },

    #[error("resource {family} '{name}': {source}")]
    InvalidResource {
        family: String,
        name: String,
        #[source]
        source: CloudError,
    },

    #[error("resource not found: {0}")]
    ResourceNotFound(String),
}

pub type Result<T> = std::result::Result<T, FlowError>;
