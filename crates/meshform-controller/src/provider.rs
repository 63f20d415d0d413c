//! `RemoteOperations` over the controller API
//!
//! Action names follow the controller's convention: `create_<kind>`,
//! `get_<kind>`, `delete_<kind>`; updates use the operation carried by the
//! delta. Resources are addressed by their family's key field (`gw_name`,
//! `account_name`, ...).

use crate::client::ControllerClient;
use crate::error::{ControllerError, Result};
use async_trait::async_trait;
use meshform_cloud::{FieldDelta, RemoteError, RemoteOperations, Snapshot, catalog};
use serde_json::Value;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

fn key_field(kind: &str) -> &'static str {
    catalog::by_remote_kind(kind)
        .map(|schema| schema.key_field)
        .unwrap_or("name")
}

fn keyed(kind: &str, key: &str) -> Snapshot {
    let mut params = Snapshot::new();
    params.insert(key_field(kind).to_string(), Value::from(key));
    params
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        _ = cancel.cancelled() => Err(ControllerError::Cancelled),
        result = fut => result,
    }
}

impl ControllerClient {
    /// `get_<kind>`, retrying transient failures
    async fn get(&self, kind: &str, key: &str, cancel: &CancellationToken) -> Result<Snapshot> {
        let action = format!("get_{kind}");
        let params = keyed(kind, key);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match cancellable(cancel, self.call(&action, &params)).await {
                Ok(Value::Object(snapshot)) => return Ok(snapshot),
                Ok(other) => {
                    return Err(ControllerError::InvalidResponse {
                        action,
                        message: format!("expected an object, got {other}"),
                    });
                }
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay(attempt);
                    warn!(%action, attempt, error = %e, "Retrying in {:?}", delay);
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(ControllerError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl RemoteOperations for ControllerClient {
    fn name(&self) -> &str {
        self.base_url().as_str()
    }

    async fn create(
        &self,
        kind: &str,
        payload: &Snapshot,
        cancel: &CancellationToken,
    ) -> std::result::Result<String, RemoteError> {
        let action = format!("create_{kind}");
        info!(%action, "Calling controller");
        let results = cancellable(cancel, self.call(&action, payload)).await?;

        let id = match &results {
            Value::Object(obj) => obj.get("id").and_then(Value::as_str).map(str::to_string),
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        };
        Ok(id
            .or_else(|| {
                payload
                    .get(key_field(kind))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_default())
    }

    async fn read(
        &self,
        kind: &str,
        key: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<Snapshot, RemoteError> {
        debug!(kind, key, "Reading");
        self.get(kind, key, cancel).await.map_err(|e| match e {
            ControllerError::NotFound(_) => RemoteError::NotFound(format!("{kind} '{key}'")),
            other => other.into(),
        })
    }

    async fn update(
        &self,
        kind: &str,
        key: &str,
        delta: &FieldDelta,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), RemoteError> {
        info!(action = %delta.operation, key, "Calling controller");
        let mut params = keyed(kind, key);
        params.extend(delta.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        cancellable(cancel, self.call(&delta.operation, &params)).await?;
        Ok(())
    }

    async fn delete(
        &self,
        kind: &str,
        key: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), RemoteError> {
        let action = format!("delete_{kind}");
        info!(%action, key, "Calling controller");
        cancellable(cancel, self.call(&action, &keyed(kind, key))).await?;
        Ok(())
    }
}
