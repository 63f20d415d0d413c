//! Reconciliation error types

use crate::remote::RemoteError;
use crate::validate::Violation;
use thiserror::Error;

/// Engine errors
#[derive(Error, Debug)]
pub enum CloudError {
    /// A configuration rule rejected the desired record. Never retried.
    #[error("Invalid configuration: {0}")]
    Validation(Violation),

    /// The resource does not exist on the controller.
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Malformed token '{token}': expected {expected} parts, found {found}")]
    MalformedToken {
        token: String,
        expected: usize,
        found: usize,
    },

    /// The first operation of a plan failed, nothing was committed.
    #[error("Operation '{operation}' ({}) failed: {source}", .fields.join(", "))]
    RemoteOperation {
        operation: String,
        fields: Vec<String>,
        #[source]
        source: RemoteError,
    },

    /// Some operations committed before a later one failed.
    #[error(
        "Partial reconciliation: committed [{}], '{failed}' ({}) failed: {source}",
        .committed.join(", "),
        .fields.join(", ")
    )]
    PartialReconciliation {
        committed: Vec<String>,
        failed: String,
        fields: Vec<String>,
        /// HA state after the committed operations, for families with HA pairing
        ha: Option<crate::ha::HaState>,
        #[source]
        source: RemoteError,
    },

    #[error("Unknown resource family: {0}")]
    UnknownFamily(String),

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// Names of the operations that reached the controller before the failure.
    pub fn committed(&self) -> &[String] {
        match self {
            CloudError::PartialReconciliation { committed, .. } => committed,
            _ => &[],
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound(_))
    }
}

impl From<Violation> for CloudError {
    fn from(v: Violation) -> Self {
        CloudError::Validation(v)
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
