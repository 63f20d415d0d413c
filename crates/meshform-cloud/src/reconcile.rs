//! Reconciliation orchestrator
//!
//! Planning is pure: [`Reconciler::plan`] turns an observed state and a
//! desired record into an ordered operation list. [`Reconciler::apply`]
//! walks that list against a [`RemoteOperations`] implementation and stops
//! at the first failure.
//!
//! Operation order within a plan:
//!
//! 1. primary structural operations (create, resize)
//! 2. destructive feature operations (disable, clear)
//! 3. enabling feature operations (enable, set, update)
//! 4. secondary (HA) structural operations
//! 5. tag updates

use crate::action::{ApplyReport, Operation, OperationClass, Plan, RemoteCall, Target};
use crate::capability::CloudType;
use crate::catalog;
use crate::diff::{ChangeSet, diff};
use crate::error::{CloudError, Result};
use crate::ha::{HaPair, HaState, secondary_exists};
use crate::record::{CLOUD_TYPE_FIELD, DesiredConfig, ObservedState};
use crate::remote::{FieldDelta, RemoteOperations, Snapshot};
use crate::schema::{FieldRole, FieldSpec, HaSpec, ResourceSchema};
use crate::validate;
use crate::value::FieldValue;
use serde_json::Value;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Reconciles instances of one resource family on one cloud type.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler<'a> {
    schema: &'a ResourceSchema,
    cloud: CloudType,
}

impl Reconciler<'static> {
    /// Reconciler for the catalog family and cloud type named by `desired`.
    pub fn for_config(desired: &DesiredConfig) -> Result<Self> {
        let schema = catalog::family(desired.family())
            .ok_or_else(|| CloudError::UnknownFamily(desired.family().to_string()))?;
        Ok(Self::new(schema, desired.cloud_type()))
    }
}

impl<'a> Reconciler<'a> {
    pub fn new(schema: &'a ResourceSchema, cloud: CloudType) -> Self {
        Self { schema, cloud }
    }

    pub fn schema(&self) -> &ResourceSchema {
        self.schema
    }

    pub fn cloud(&self) -> CloudType {
        self.cloud
    }

    fn check_family(&self, family: &str) -> Result<()> {
        if family != self.schema.family {
            return Err(CloudError::UnknownFamily(format!(
                "{family} (reconciler handles {})",
                self.schema.family
            )));
        }
        Ok(())
    }

    /// Validate `desired`, failing with the first violation.
    pub fn validate(&self, desired: &DesiredConfig) -> Result<()> {
        self.check_family(desired.family())?;
        validate::validate(self.schema, desired, self.cloud)
    }

    /// Compute the ordered operations that move `observed` to `desired`.
    ///
    /// `observed == None` means the resource does not exist yet and the plan
    /// starts with its create call.
    pub fn plan(&self, observed: Option<&ObservedState>, desired: &DesiredConfig) -> Result<Plan> {
        self.validate(desired)?;

        let changes = diff(self.schema, observed, desired);
        if observed.is_some() {
            validate::validate_changes(self.schema, &changes)?;
        }

        let name = desired.name();
        let mut structural = Vec::new();
        let mut destructive = Vec::new();
        let mut secondary = Vec::new();
        let mut enabling = Vec::new();
        let mut tags = Vec::new();

        if observed.is_none() {
            let specs = self.schema.fields.iter().filter(|f| f.in_create_payload());
            let (payload, fields) = self.payload(desired, name, specs);
            structural.push(Operation {
                name: format!("create_{}", self.schema.remote_kind),
                class: OperationClass::Structural,
                call: RemoteCall::Create,
                target: Target::Primary,
                kind: self.schema.remote_kind.to_string(),
                key: name.to_string(),
                fields,
                payload,
            });
        }

        for change in changes.iter() {
            let Some(spec) = self.schema.get(&change.field) else {
                continue;
            };
            match spec.role {
                FieldRole::CreateOnly | FieldRole::Ha | FieldRole::Computed => {}
                FieldRole::Resize { operation } => {
                    if observed.is_some() {
                        let op = self.update(operation, OperationClass::Structural, name, spec, &change.new);
                        merge(&mut structural, op);
                    }
                }
                FieldRole::Toggle { enable, disable } => {
                    if change.new.as_bool() == Some(true) {
                        let op = self.update(enable, OperationClass::FeatureToggle, name, spec, &change.new);
                        merge(&mut enabling, op);
                    } else {
                        let op = self.update(disable, OperationClass::FeatureToggle, name, spec, &change.new);
                        merge(&mut destructive, op);
                    }
                }
                FieldRole::Setting { operation } => {
                    let op = self.update(operation, OperationClass::FeatureToggle, name, spec, &change.new);
                    merge(&mut enabling, op);
                }
                FieldRole::Replace { clear, set } => {
                    let neutral = spec.field_type.neutral();
                    if !spec.equality.same(&change.old, &neutral) {
                        let op = self.update(clear, OperationClass::FeatureToggle, name, spec, &neutral);
                        merge(&mut destructive, op);
                    }
                    if !spec.equality.same(&change.new, &neutral) {
                        let op = self.update(set, OperationClass::FeatureToggle, name, spec, &change.new);
                        merge(&mut enabling, op);
                    }
                }
                FieldRole::Tags { operation } => {
                    let op = self.update(operation, OperationClass::Tag, name, spec, &change.new);
                    merge(&mut tags, op);
                }
            }
        }

        let ha = self.schema.ha.as_ref().map(|spec| {
            let pair = HaPair::evaluate(spec, observed, desired, &changes);
            secondary = self.secondary_operations(spec, &pair, desired, &changes);
            pair
        });

        let operations: Vec<Operation> = structural
            .into_iter()
            .chain(destructive)
            .chain(enabling)
            .chain(secondary)
            .chain(tags)
            .collect();

        for op in &operations {
            debug!(class = %op.class, "planned {op}");
        }

        Ok(Plan::new(self.schema.family, name, operations, ha))
    }

    /// Operations that delete an existing resource, secondary first.
    pub fn plan_delete(&self, observed: &ObservedState) -> Result<Plan> {
        self.check_family(observed.family())?;
        let name = observed.name();
        let mut operations = Vec::new();

        let ha = match &self.schema.ha {
            Some(spec) => {
                let exists = secondary_exists(spec, Some(observed));
                let secondary = observed
                    .secondary()
                    .map(str::to_string)
                    .unwrap_or_else(|| spec.secondary_name(name));
                if exists {
                    operations.push(self.delete_secondary(spec, &secondary, Vec::new()));
                }
                Some(HaPair {
                    primary: name.to_string(),
                    secondary,
                    state: if exists {
                        HaState::Disabling
                    } else {
                        HaState::Absent
                    },
                    recreate: false,
                    resize: false,
                })
            }
            None => None,
        };

        operations.push(Operation {
            name: format!("delete_{}", self.schema.remote_kind),
            class: OperationClass::Structural,
            call: RemoteCall::Delete,
            target: Target::Primary,
            kind: self.schema.remote_kind.to_string(),
            key: name.to_string(),
            fields: Vec::new(),
            payload: Snapshot::new(),
        });

        Ok(Plan::new(self.schema.family, name, operations, ha))
    }

    /// Fetch and decode the current state. A resource the controller no
    /// longer knows is `Ok(None)`.
    pub async fn read(
        &self,
        remote: &dyn RemoteOperations,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ObservedState>> {
        let kind = self.schema.remote_kind;
        match remote.read(kind, name, cancel).await {
            Ok(snapshot) => {
                // the snapshot's own cloud type decides how its tokens decode
                let cloud = snapshot
                    .get(CLOUD_TYPE_FIELD)
                    .and_then(|v| v.as_u64().or_else(|| v.as_str()?.parse().ok()))
                    .and_then(|raw| u32::try_from(raw).ok())
                    .map(CloudType::from_raw)
                    .unwrap_or(self.cloud);
                let state = ObservedState::from_snapshot(self.schema, name, cloud, &snapshot)?;
                Ok(Some(state))
            }
            Err(e) if e.is_not_found() => {
                info!(kind, name, "resource no longer exists on {}", remote.name());
                Ok(None)
            }
            Err(source) => Err(CloudError::RemoteOperation {
                operation: format!("get_{kind}"),
                fields: Vec::new(),
                source,
            }),
        }
    }

    /// Execute `plan` in order, stopping at the first failure.
    ///
    /// A failure of the first operation is a `RemoteOperation` error; a later
    /// one is `PartialReconciliation` listing what already committed. Nothing
    /// is rolled back.
    pub async fn apply(
        &self,
        remote: &dyn RemoteOperations,
        plan: &Plan,
        cancel: &CancellationToken,
    ) -> Result<ApplyReport> {
        let started = Instant::now();
        let mut committed: Vec<String> = Vec::new();
        let mut remote_id = None;

        for (index, op) in plan.operations.iter().enumerate() {
            let outcome = match op.call {
                RemoteCall::Create => remote.create(&op.kind, &op.payload, cancel).await.map(|id| {
                    if op.target == Target::Primary {
                        remote_id = Some(id);
                    }
                }),
                RemoteCall::Update => {
                    let delta = FieldDelta {
                        operation: op.name.clone(),
                        values: op.payload.clone(),
                    };
                    remote.update(&op.kind, &op.key, &delta, cancel).await
                }
                RemoteCall::Delete => remote.delete(&op.kind, &op.key, cancel).await,
            };

            match outcome {
                Ok(()) => {
                    info!(class = %op.class, "applied {op}");
                    committed.push(op.name.clone());
                }
                Err(source) if committed.is_empty() => {
                    return Err(CloudError::RemoteOperation {
                        operation: op.name.clone(),
                        fields: op.fields.clone(),
                        source,
                    });
                }
                Err(source) => {
                    // settled once no secondary operation is left among the failed and unrun ones
                    let secondary_done = plan.operations[index..]
                        .iter()
                        .all(|o| o.target != Target::Secondary);
                    let ha = plan.ha_state().map(|s| s.settle(secondary_done));
                    warn!(
                        committed = committed.len(),
                        ha = ?ha,
                        "{} failed after partial apply: {source}",
                        op.name
                    );
                    return Err(CloudError::PartialReconciliation {
                        committed,
                        failed: op.name.clone(),
                        fields: op.fields.clone(),
                        ha,
                        source,
                    });
                }
            }
        }

        Ok(ApplyReport {
            committed,
            remote_id,
            ha: plan.ha_state().map(|s| s.settle(true)),
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Validate, read, plan and apply in one pass.
    pub async fn reconcile(
        &self,
        remote: &dyn RemoteOperations,
        desired: &DesiredConfig,
        cancel: &CancellationToken,
    ) -> Result<ApplyReport> {
        self.validate(desired)?;
        let observed = self.read(remote, desired.name(), cancel).await?;
        let plan = self.plan(observed.as_ref(), desired)?;
        if !plan.has_changes {
            info!(name = desired.name(), "no changes");
        }
        self.apply(remote, &plan, cancel).await
    }

    /// Delete a resource and its secondary.
    pub async fn destroy(
        &self,
        remote: &dyn RemoteOperations,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<ApplyReport> {
        let observed = self
            .read(remote, name, cancel)
            .await?
            .ok_or_else(|| CloudError::NotFound(format!("{} '{name}'", self.schema.family)))?;
        let plan = self.plan_delete(&observed)?;
        self.apply(remote, &plan, cancel).await
    }

    fn secondary_operations(
        &self,
        spec: &HaSpec,
        pair: &HaPair,
        desired: &DesiredConfig,
        changes: &ChangeSet,
    ) -> Vec<Operation> {
        let changed: Vec<String> = changes
            .fields()
            .filter(|f| {
                self.schema
                    .get(f)
                    .is_some_and(|s| matches!(s.role, FieldRole::Ha))
            })
            .map(str::to_string)
            .collect();

        match pair.state {
            HaState::Absent | HaState::Present => Vec::new(),
            HaState::Enabling => vec![self.create_secondary(spec, pair, desired)],
            HaState::Disabling => vec![self.delete_secondary(spec, &pair.secondary, changed)],
            HaState::Resizing if pair.recreate => vec![
                self.delete_secondary(spec, &pair.secondary, changed),
                self.create_secondary(spec, pair, desired),
            ],
            HaState::Resizing => {
                let mut payload = Snapshot::new();
                payload.insert(self.schema.key_field.into(), Value::from(pair.secondary.as_str()));
                payload.insert(
                    spec.size_field.into(),
                    Value::from(desired.str(spec.size_field)),
                );
                vec![Operation {
                    name: spec.resize.to_string(),
                    class: OperationClass::Structural,
                    call: RemoteCall::Update,
                    target: Target::Secondary,
                    kind: spec.kind.to_string(),
                    key: pair.secondary.clone(),
                    fields: vec![spec.size_field.to_string()],
                    payload,
                }]
            }
        }
    }

    fn create_secondary(&self, spec: &HaSpec, pair: &HaPair, desired: &DesiredConfig) -> Operation {
        let specs = self
            .schema
            .fields
            .iter()
            .filter(|f| matches!(f.role, FieldRole::Ha));
        // the secondary is addressed through its primary
        let (payload, fields) = self.payload(desired, &pair.primary, specs);
        Operation {
            name: spec.create.to_string(),
            class: OperationClass::Structural,
            call: RemoteCall::Create,
            target: Target::Secondary,
            kind: spec.kind.to_string(),
            key: pair.secondary.clone(),
            fields,
            payload,
        }
    }

    fn delete_secondary(&self, spec: &HaSpec, secondary: &str, fields: Vec<String>) -> Operation {
        Operation {
            name: spec.delete.to_string(),
            class: OperationClass::Structural,
            call: RemoteCall::Delete,
            target: Target::Secondary,
            kind: spec.kind.to_string(),
            key: secondary.to_string(),
            fields,
            payload: Snapshot::new(),
        }
    }

    fn update(
        &self,
        operation: &str,
        class: OperationClass,
        name: &str,
        spec: &FieldSpec,
        value: &FieldValue,
    ) -> Operation {
        let mut payload = Snapshot::new();
        payload.insert(self.schema.key_field.into(), Value::from(name));
        payload.insert(spec.name.into(), value.to_json());
        Operation {
            name: operation.to_string(),
            class,
            call: RemoteCall::Update,
            target: Target::Primary,
            kind: self.schema.remote_kind.to_string(),
            key: name.to_string(),
            fields: vec![spec.name.to_string()],
            payload,
        }
    }

    /// Create payload for `specs`: explicitly configured fields and fields
    /// with a declared default, with composite tokens encoded.
    fn payload<'s>(
        &self,
        desired: &DesiredConfig,
        key: &str,
        specs: impl Iterator<Item = &'s FieldSpec>,
    ) -> (Snapshot, Vec<String>) {
        let mut payload = Snapshot::new();
        payload.insert(self.schema.key_field.into(), Value::from(key));
        let mut fields = Vec::new();

        for spec in specs {
            if desired.get(spec.name).is_none() && spec.default.is_none() {
                continue;
            }
            payload.insert(spec.name.into(), desired.effective(spec).to_json());
            fields.push(spec.name.to_string());
        }

        let mut done: Vec<&str> = Vec::new();
        for binding in &self.schema.tokens {
            if done.contains(&binding.base) {
                continue;
            }
            done.push(binding.base);

            let Some(base) = payload
                .get(binding.base)
                .and_then(Value::as_str)
                .map(str::to_string)
            else {
                continue;
            };
            let Some(applied) = self
                .schema
                .binding_for(binding.base, self.cloud, |f| desired.is_true(f))
            else {
                continue;
            };
            let qualifiers: Vec<&str> = applied.qualifiers.iter().map(|q| desired.str(q)).collect();
            let token = applied.family.encode(&base, &qualifiers);
            payload.insert(binding.base.into(), Value::String(token));
            // folded into the token, never sent on their own
            for q in &applied.qualifiers {
                payload.remove(*q);
            }
        }

        (payload, fields)
    }
}

/// Queue `op`, folding it into an earlier operation with the same name.
fn merge(queue: &mut Vec<Operation>, op: Operation) {
    match queue.iter_mut().find(|o| o.name == op.name && o.key == op.key) {
        Some(existing) => {
            existing.fields.extend(op.fields);
            existing.payload.extend(op.payload);
        }
        None => queue.push(op),
    }
}
