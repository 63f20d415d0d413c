//! In-memory controller for tests
//!
//! Stores snapshots per `(kind, key)` and records every call. Secondary
//! (HA) kinds from the catalog are folded into their primary's snapshot the
//! way the controller reports them.

use crate::catalog;
use crate::remote::{FieldDelta, RemoteError, RemoteOperations, Snapshot};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// A recorded call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create { kind: String, payload: Snapshot },
    Read { kind: String, key: String },
    Update { kind: String, key: String, operation: String },
    Delete { kind: String, key: String },
}

#[derive(Default)]
struct Inner {
    resources: HashMap<(String, String), Snapshot>,
    calls: Vec<Call>,
    next_id: u64,
}

#[derive(Default)]
pub struct MemoryRemote {
    inner: Mutex<Inner>,
    failing: HashSet<String>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call whose operation name is `operation`
    /// (`create_<kind>`, `delete_<kind>`, or the update operation).
    pub fn fail_on(mut self, operation: &str) -> Self {
        self.failing.insert(operation.to_string());
        self
    }

    pub fn clear_failures(mut self) -> Self {
        self.failing.clear();
        self
    }

    /// Seed a resource as if it had been created out of band.
    pub fn insert(&self, kind: &str, key: &str, snapshot: Snapshot) {
        self.lock()
            .resources
            .insert((kind.to_string(), key.to_string()), snapshot);
    }

    pub fn snapshot(&self, kind: &str, key: &str) -> Option<Snapshot> {
        self.lock()
            .resources
            .get(&(kind.to_string(), key.to_string()))
            .cloned()
    }

    /// Calls that changed something, reads excluded.
    pub fn calls(&self) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|c| !matches!(c, Call::Read { .. }))
            .cloned()
            .collect()
    }

    pub fn all_calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check(&self, operation: &str) -> Result<(), RemoteError> {
        if self.failing.contains(operation) {
            return Err(RemoteError::Rejected(format!("{operation} failed")));
        }
        Ok(())
    }
}

/// For a secondary kind, the primary kind, its key field and the HA marker.
fn secondary_of(kind: &str) -> Option<(&'static str, &'static str, &'static str, &'static str)> {
    let schema = catalog::by_remote_kind(kind)?;
    let ha = schema.ha.as_ref().filter(|ha| ha.kind == kind)?;
    Some((schema.remote_kind, schema.key_field, ha.observed_marker, ha.suffix))
}

fn key_of(kind: &str, payload: &Snapshot) -> Option<String> {
    let field = catalog::by_remote_kind(kind)
        .map(|s| s.key_field)
        .unwrap_or("name");
    payload.get(field).and_then(Value::as_str).map(str::to_string)
}

#[async_trait]
impl RemoteOperations for MemoryRemote {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create(
        &self,
        kind: &str,
        payload: &Snapshot,
        _cancel: &CancellationToken,
    ) -> Result<String, RemoteError> {
        let operation = format!("create_{kind}");
        let mut inner = self.lock();
        inner.calls.push(Call::Create {
            kind: kind.to_string(),
            payload: payload.clone(),
        });
        self.check(&operation)?;

        let key = key_of(kind, payload)
            .ok_or_else(|| RemoteError::Rejected(format!("{operation}: missing name")))?;
        inner.next_id += 1;
        let id = format!("id-{}", inner.next_id);

        if let Some((primary_kind, key_field, marker, suffix)) = secondary_of(kind) {
            let primary = inner
                .resources
                .get_mut(&(primary_kind.to_string(), key.clone()))
                .ok_or_else(|| RemoteError::NotFound(format!("{primary_kind} '{key}'")))?;
            for (k, v) in payload {
                if k != key_field {
                    primary.insert(k.clone(), v.clone());
                }
            }
            primary.insert(marker.to_string(), Value::from(format!("{key}{suffix}")));
            return Ok(id);
        }

        let resource = (kind.to_string(), key.clone());
        if inner.resources.contains_key(&resource) {
            return Err(RemoteError::Rejected(format!("{kind} '{key}' already exists")));
        }
        inner.resources.insert(resource, payload.clone());
        Ok(id)
    }

    async fn read(
        &self,
        kind: &str,
        key: &str,
        _cancel: &CancellationToken,
    ) -> Result<Snapshot, RemoteError> {
        let mut inner = self.lock();
        inner.calls.push(Call::Read {
            kind: kind.to_string(),
            key: key.to_string(),
        });
        self.check(&format!("get_{kind}"))?;
        inner
            .resources
            .get(&(kind.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("{kind} '{key}'")))
    }

    async fn update(
        &self,
        kind: &str,
        key: &str,
        delta: &FieldDelta,
        _cancel: &CancellationToken,
    ) -> Result<(), RemoteError> {
        let mut inner = self.lock();
        inner.calls.push(Call::Update {
            kind: kind.to_string(),
            key: key.to_string(),
            operation: delta.operation.clone(),
        });
        self.check(&delta.operation)?;

        let (target, skip) = match secondary_of(kind) {
            Some((primary_kind, key_field, marker, _)) => {
                let primary = inner
                    .resources
                    .iter()
                    .find(|((k, _), s)| {
                        k == primary_kind && s.get(marker).and_then(Value::as_str) == Some(key)
                    })
                    .map(|(id, _)| id.clone())
                    .ok_or_else(|| RemoteError::NotFound(format!("{kind} '{key}'")))?;
                (primary, key_field)
            }
            None => {
                let skip = catalog::by_remote_kind(kind)
                    .map(|s| s.key_field)
                    .unwrap_or("name");
                ((kind.to_string(), key.to_string()), skip)
            }
        };

        let snapshot = inner
            .resources
            .get_mut(&target)
            .ok_or_else(|| RemoteError::NotFound(format!("{kind} '{key}'")))?;
        for (k, v) in &delta.values {
            if k != skip {
                snapshot.insert(k.clone(), v.clone());
            }
        }
        Ok(())
    }

    async fn delete(
        &self,
        kind: &str,
        key: &str,
        _cancel: &CancellationToken,
    ) -> Result<(), RemoteError> {
        let mut inner = self.lock();
        inner.calls.push(Call::Delete {
            kind: kind.to_string(),
            key: key.to_string(),
        });
        self.check(&format!("delete_{kind}"))?;

        if let Some((primary_kind, _, marker, _)) = secondary_of(kind) {
            let Some(schema) = catalog::by_remote_kind(kind) else {
                return Err(RemoteError::NotFound(format!("{kind} '{key}'")));
            };
            let primary = inner
                .resources
                .iter_mut()
                .find(|((k, _), s)| {
                    k == primary_kind && s.get(marker).and_then(Value::as_str) == Some(key)
                })
                .map(|(_, s)| s)
                .ok_or_else(|| RemoteError::NotFound(format!("{kind} '{key}'")))?;
            primary.remove(marker);
            for spec in &schema.fields {
                if matches!(spec.role, crate::schema::FieldRole::Ha) {
                    primary.remove(spec.name);
                }
            }
            return Ok(());
        }

        inner
            .resources
            .remove(&(kind.to_string(), key.to_string()))
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound(format!("{kind} '{key}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_secondary_is_folded_into_primary() {
        let remote = MemoryRemote::new();
        let cancel = CancellationToken::new();
        let primary = json!({"gw_name": "gw", "gw_size": "small"});
        remote
            .create("spoke_gateway", primary.as_object().unwrap(), &cancel)
            .await
            .unwrap();
        let ha = json!({"gw_name": "gw", "ha_subnet": "10.0.2.0/24"});
        remote
            .create("spoke_ha_gateway", ha.as_object().unwrap(), &cancel)
            .await
            .unwrap();

        let snapshot = remote.read("spoke_gateway", "gw", &cancel).await.unwrap();
        assert_eq!(snapshot["ha_gw_name"], json!("gw-hagw"));
        assert_eq!(snapshot["ha_subnet"], json!("10.0.2.0/24"));

        remote.delete("spoke_ha_gateway", "gw-hagw", &cancel).await.unwrap();
        let snapshot = remote.read("spoke_gateway", "gw", &cancel).await.unwrap();
        assert!(!snapshot.contains_key("ha_gw_name"));
        assert!(!snapshot.contains_key("ha_subnet"));
    }

    #[tokio::test]
    async fn test_missing_resource_is_not_found() {
        let remote = MemoryRemote::new();
        let err = remote
            .read("vpc", "none", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
