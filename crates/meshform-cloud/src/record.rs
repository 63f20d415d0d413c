//! Desired and observed resource records

use crate::capability::CloudType;
use crate::error::{CloudError, Result};
use crate::remote::Snapshot;
use crate::schema::{FieldRole, FieldSpec, ResourceSchema};
use crate::token;
use crate::value::FieldValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const CLOUD_TYPE_FIELD: &str = "cloud_type";

/// User supplied fields for one resource instance, already normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredConfig {
    family: String,
    name: String,
    values: BTreeMap<String, FieldValue>,
}

impl DesiredConfig {
    pub fn new(family: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: impl Into<String>, value: FieldValue) -> Self {
        self.values.insert(field.into(), value);
        self
    }

    /// Build a record from an untyped JSON object, normalizing each entry
    /// with the schema's declared field type.
    pub fn from_json(
        schema: &ResourceSchema,
        name: impl Into<String>,
        object: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self> {
        let mut config = Self::new(schema.family, name);
        for (key, raw) in object {
            let spec = schema.get(key).ok_or_else(|| CloudError::InvalidValue {
                field: key.clone(),
                message: format!("not a field of '{}'", schema.family),
            })?;
            if matches!(spec.role, FieldRole::Computed) {
                return Err(CloudError::InvalidValue {
                    field: key.clone(),
                    message: "read-only field cannot be configured".to_string(),
                });
            }
            config.values.insert(key.clone(), spec.field_type.normalize(key, raw)?);
        }
        Ok(config)
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    /// Present and populated (see [`FieldValue::is_populated`]).
    pub fn is_set(&self, field: &str) -> bool {
        self.get(field).is_some_and(FieldValue::is_populated)
    }

    /// Present with an explicit `false`.
    pub fn is_explicit_false(&self, field: &str) -> bool {
        self.get(field).and_then(FieldValue::as_bool) == Some(false)
    }

    pub fn is_true(&self, field: &str) -> bool {
        self.get(field).and_then(FieldValue::as_bool).unwrap_or(false)
    }

    pub fn str(&self, field: &str) -> &str {
        self.get(field).and_then(FieldValue::as_str).unwrap_or("")
    }

    /// Value as the reconciler sees it: the configured value or the default.
    pub fn effective(&self, spec: &FieldSpec) -> FieldValue {
        self.get(spec.name)
            .cloned()
            .unwrap_or_else(|| spec.default_value())
    }

    /// `cloud_type` as configured, or [`CloudType::UNSET`].
    pub fn cloud_type(&self) -> CloudType {
        self.get(CLOUD_TYPE_FIELD)
            .and_then(FieldValue::as_int)
            .and_then(|raw| u32::try_from(raw).ok())
            .map(CloudType::from_raw)
            .unwrap_or(CloudType::UNSET)
    }

    pub fn values(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.values.iter()
    }
}

/// Last known controller representation of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedState {
    family: String,
    name: String,
    values: BTreeMap<String, FieldValue>,
    /// Name of the HA secondary, when the controller reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    secondary: Option<String>,
}

impl ObservedState {
    pub fn new(family: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            name: name.into(),
            values: BTreeMap::new(),
            secondary: None,
        }
    }

    pub fn with(mut self, field: impl Into<String>, value: FieldValue) -> Self {
        self.values.insert(field.into(), value);
        self
    }

    pub fn with_secondary(mut self, name: impl Into<String>) -> Self {
        self.secondary = Some(name.into());
        self
    }

    /// Normalize a controller snapshot and split its composite tokens.
    ///
    /// Snapshot keys the schema doesn't declare are dropped.
    pub fn from_snapshot(
        schema: &ResourceSchema,
        name: impl Into<String>,
        cloud: CloudType,
        snapshot: &Snapshot,
    ) -> Result<Self> {
        let mut state = Self::new(schema.family, name);

        for spec in &schema.fields {
            if let Some(raw) = snapshot.get(spec.name) {
                let value = spec.field_type.normalize(spec.name, raw)?;
                state.values.insert(spec.name.to_string(), value);
            }
        }

        state.split_tokens(schema, cloud)?;

        if let Some(ha) = &schema.ha {
            state.secondary = snapshot
                .get(ha.observed_marker)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string);
        }

        Ok(state)
    }

    fn split_tokens(&mut self, schema: &ResourceSchema, cloud: CloudType) -> Result<()> {
        let mut bases: Vec<&'static str> = Vec::new();
        for binding in &schema.tokens {
            if !bases.contains(&binding.base) {
                bases.push(binding.base);
            }
        }

        for base in bases {
            let Some(token) = self.get(base).and_then(FieldValue::as_str).map(str::to_string)
            else {
                continue;
            };

            let values = &self.values;
            let truthy = |f: &str| values.get(f).and_then(FieldValue::as_bool).unwrap_or(false);
            let Some(binding) = schema.binding_for(base, cloud, truthy) else {
                // no rule applies, so the value must not carry qualifiers
                token::decode(&token, 1)?;
                continue;
            };

            let mut parts = binding.family.decode(&token)?.into_iter();
            if let Some(plain) = parts.next() {
                self.values.insert(base.to_string(), FieldValue::Str(plain));
            }
            for (field, part) in binding.qualifiers.iter().copied().zip(parts) {
                if !part.is_empty() || !self.values.contains_key(field) {
                    self.values.insert(field.to_string(), FieldValue::Str(part));
                }
            }
        }
        Ok(())
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    pub fn is_set(&self, field: &str) -> bool {
        self.get(field).is_some_and(FieldValue::is_populated)
    }

    pub fn effective(&self, spec: &FieldSpec) -> FieldValue {
        self.get(spec.name)
            .cloned()
            .unwrap_or_else(|| spec.default_value())
    }

    pub fn secondary(&self) -> Option<&str> {
        self.secondary.as_deref()
    }

    pub fn values(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.values.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CloudTypes;
    use crate::schema::{HaSpec, TokenBinding};
    use crate::token::TokenFamily;
    use crate::value::FieldType;
    use serde_json::json;

    fn schema() -> ResourceSchema {
        ResourceSchema::new("gateway", "gw_name", CloudTypes::CLOUD)
            .field(FieldSpec::new("cloud_type", FieldType::Int, FieldRole::CreateOnly))
            .field(FieldSpec::new("subnet", FieldType::Str, FieldRole::CreateOnly))
            .field(FieldSpec::new("zone", FieldType::Str, FieldRole::CreateOnly))
            .field(FieldSpec::new("insane_mode", FieldType::Bool, FieldRole::CreateOnly))
            .field(FieldSpec::new("insane_mode_az", FieldType::Str, FieldRole::CreateOnly))
            .field(FieldSpec::new("public_ip", FieldType::Str, FieldRole::Computed))
            .token(TokenBinding::new(
                "subnet",
                vec!["zone"],
                CloudTypes::AZURE_RELATED,
                TokenFamily::AzureZone,
            ))
            .token(
                TokenBinding::new(
                    "subnet",
                    vec!["insane_mode_az"],
                    CloudTypes::AWS_RELATED,
                    TokenFamily::InsaneModeAz,
                )
                .when("insane_mode"),
            )
            .ha(HaSpec {
                kind: "gateway_ha",
                suffix: "-hagw",
                triggers: vec!["ha_subnet"],
                mandatory: vec![],
                placement: vec!["ha_subnet"],
                size_field: "ha_gw_size",
                observed_marker: "ha_gw_name",
                create: "create_ha_gateway",
                delete: "delete_ha_gateway",
                resize: "update_ha_gateway_size",
            })
    }

    #[test]
    fn test_from_json_normalizes() {
        let object = json!({"cloud_type": 8, "subnet": "10.0.1.0/24", "insane_mode": "yes"});
        let config =
            DesiredConfig::from_json(&schema(), "gw-1", object.as_object().unwrap()).unwrap();
        assert_eq!(config.cloud_type(), CloudType::AZURE);
        assert!(config.is_true("insane_mode"));
        assert_eq!(config.str("subnet"), "10.0.1.0/24");
    }

    #[test]
    fn test_from_json_rejects_unknown_and_computed() {
        let unknown = json!({"color": "blue"});
        assert!(DesiredConfig::from_json(&schema(), "gw", unknown.as_object().unwrap()).is_err());

        let computed = json!({"public_ip": "1.2.3.4"});
        assert!(
            DesiredConfig::from_json(&schema(), "gw", computed.as_object().unwrap()).is_err()
        );
    }

    #[test]
    fn test_snapshot_splits_azure_zone() {
        let snapshot = json!({
            "cloud_type": 8,
            "subnet": "10.0.1.0/24~~az-2~~",
            "public_ip": "20.1.1.1",
            "vendor_field": "ignored",
            "ha_gw_name": "gw-1-hagw",
        });
        let state = ObservedState::from_snapshot(
            &schema(),
            "gw-1",
            CloudType::AZURE,
            snapshot.as_object().unwrap(),
        )
        .unwrap();

        assert_eq!(state.get("subnet"), Some(&FieldValue::str("10.0.1.0/24")));
        assert_eq!(state.get("zone"), Some(&FieldValue::str("az-2")));
        assert!(state.get("vendor_field").is_none());
        assert_eq!(state.secondary(), Some("gw-1-hagw"));
    }

    #[test]
    fn test_snapshot_insane_mode_only_when_enabled() {
        let snapshot = json!({"subnet": "10.0.0.0/26~~us-east-1a", "insane_mode": true});
        let state = ObservedState::from_snapshot(
            &schema(),
            "gw-1",
            CloudType::AWS,
            snapshot.as_object().unwrap(),
        )
        .unwrap();
        assert_eq!(state.get("insane_mode_az"), Some(&FieldValue::str("us-east-1a")));

        // a qualified subnet without insane mode is contract drift
        let snapshot = json!({"subnet": "10.0.0.0/26~~us-east-1a", "insane_mode": false});
        let err = ObservedState::from_snapshot(
            &schema(),
            "gw-1",
            CloudType::AWS,
            snapshot.as_object().unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, CloudError::MalformedToken { .. }));
    }
}
