//! Controller client error types

use meshform_cloud::RemoteError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("controller returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("{action} failed: {reason}")]
    Api { action: String, reason: String },

    #[error("{0} does not exist")]
    NotFound(String),

    #[error("login failed: {0}")]
    Authentication(String),

    #[error("unexpected response to {action}: {message}")]
    InvalidResponse { action: String, message: String },

    #[error("invalid controller URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("request cancelled")]
    Cancelled,
}

impl ControllerError {
    /// Failures worth another attempt
    pub fn is_transient(&self) -> bool {
        match self {
            ControllerError::Transport(e) => e.is_timeout() || e.is_connect(),
            ControllerError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<ControllerError> for RemoteError {
    fn from(err: ControllerError) -> Self {
        match err {
            ControllerError::NotFound(what) => RemoteError::NotFound(what),
            ControllerError::Cancelled => RemoteError::Cancelled,
            ControllerError::Transport(e) => RemoteError::Transport(e.to_string()),
            ControllerError::Http { status, body } if status >= 500 => {
                RemoteError::Transport(format!("HTTP {status}: {body}"))
            }
            other => RemoteError::Rejected(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ControllerError>;
