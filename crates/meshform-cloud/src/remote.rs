//! Remote operations interface
//!
//! The engine never talks to the controller directly. Everything goes
//! through an implementation of [`RemoteOperations`], one call per queued
//! operation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Untyped controller representation of a resource, or a call payload.
pub type Snapshot = serde_json::Map<String, serde_json::Value>;

/// Fields sent with one update call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDelta {
    /// Controller operation that applies the change, e.g. `enable_vpc_dns_server`.
    pub operation: String,
    pub values: Snapshot,
}

impl FieldDelta {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            values: Snapshot::new(),
        }
    }
}

/// Failure reported by a [`RemoteOperations`] implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("{0} does not exist")]
    NotFound(String),

    #[error("rejected by controller: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("cancelled")]
    Cancelled,
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }
}

/// Controller side of a reconciliation pass.
///
/// Calls are synchronous to acceptance: a returned `Ok` means the controller
/// took the request, not that the change has finished applying. The
/// cancellation token is the caller's and is handed through untouched.
#[async_trait]
pub trait RemoteOperations: Send + Sync {
    /// Name for logs, e.g. the controller address.
    fn name(&self) -> &str;

    /// Create a resource and return its remote id.
    async fn create(
        &self,
        kind: &str,
        payload: &Snapshot,
        cancel: &CancellationToken,
    ) -> Result<String, RemoteError>;

    /// Fetch a resource. Absence is [`RemoteError::NotFound`], never an
    /// empty snapshot.
    async fn read(
        &self,
        kind: &str,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<Snapshot, RemoteError>;

    async fn update(
        &self,
        kind: &str,
        key: &str,
        delta: &FieldDelta,
        cancel: &CancellationToken,
    ) -> Result<(), RemoteError>;

    async fn delete(
        &self,
        kind: &str,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<(), RemoteError>;
}

/// Retry policy for callers and transports. The engine itself never retries.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,

    /// Initial delay between attempts
    pub initial_delay: std::time::Duration,

    /// Maximum delay between attempts
    pub max_delay: std::time::Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Delay before attempt `attempt` (1-based, the first retry is 1).
    pub fn delay(&self, attempt: u32) -> std::time::Duration {
        let factor = self
            .backoff_multiplier
            .powi(attempt.saturating_sub(1) as i32);
        self.initial_delay.mul_f64(factor).min(self.max_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: std::time::Duration::from_secs(1),
            max_delay: std::time::Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_retry_delay_backs_off_and_caps() {
        let retry = RetryConfig::default();
        assert_eq!(retry.delay(1), Duration::from_secs(1));
        assert_eq!(retry.delay(2), Duration::from_secs(2));
        assert_eq!(retry.delay(3), Duration::from_secs(4));
        assert_eq!(retry.delay(10), Duration::from_secs(30));
    }

    #[test]
    fn test_not_found_message() {
        let err = RemoteError::NotFound("gateway 'gw-1'".into());
        assert_eq!(err.to_string(), "gateway 'gw-1' does not exist");
        assert!(err.is_not_found());
        assert!(!RemoteError::Cancelled.is_not_found());
    }
}
