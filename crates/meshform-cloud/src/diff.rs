//! Change-set differencer

use crate::record::{DesiredConfig, ObservedState};
use crate::schema::ResourceSchema;
use crate::value::FieldValue;
use serde::{Deserialize, Serialize};

/// One field whose observed and desired values differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old: FieldValue,
    pub new: FieldValue,
}

/// Changed fields in schema declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    changes: Vec<FieldChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.changes.iter().find(|c| c.field == field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldChange> {
        self.changes.iter()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().map(|c| c.field.as_str())
    }
}

/// Compare `observed` against `desired` field by field.
///
/// Fields missing on either side take their default, so a field dropped from
/// the desired record only counts as changed when the observed value differs
/// from that default. Without an observed state every field is compared
/// against its default.
pub fn diff(
    schema: &ResourceSchema,
    observed: Option<&ObservedState>,
    desired: &DesiredConfig,
) -> ChangeSet {
    let mut changes = Vec::new();

    for spec in schema.managed_fields() {
        let old = match observed {
            Some(state) => state.effective(spec),
            None => spec.default_value(),
        };
        let new = desired.effective(spec);

        if !spec.equality.same(&old, &new) {
            tracing::debug!(field = spec.name, ?old, ?new, "field changed");
            changes.push(FieldChange {
                field: spec.name.to_string(),
                old,
                new,
            });
        }
    }

    ChangeSet { changes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CloudTypes;
    use crate::schema::{FieldRole, FieldSpec};
    use crate::value::{Equality, FieldType};

    fn schema() -> ResourceSchema {
        ResourceSchema::new("transit_gateway", "gw_name", CloudTypes::ALL).fields([
            FieldSpec::new("gw_size", FieldType::Str, FieldRole::Resize {
                operation: "edit_gw_size",
            }),
            FieldSpec::new("bgp_hold_time", FieldType::Int, FieldRole::Setting {
                operation: "change_bgp_hold_time",
            })
            .with_default(FieldValue::Int(180)),
            FieldSpec::new("advertised_cidrs", FieldType::StrSet, FieldRole::Setting {
                operation: "edit_advertised_cidrs",
            })
            .with_equality(Equality::UnorderedCaseInsensitive),
            FieldSpec::new("prepend_as_path", FieldType::StrList, FieldRole::Setting {
                operation: "edit_prepend_as_path",
            }),
            FieldSpec::new("tags", FieldType::Map, FieldRole::Tags {
                operation: "update_tags",
            }),
            FieldSpec::new("public_ip", FieldType::Str, FieldRole::Computed),
        ])
    }

    fn observed() -> ObservedState {
        ObservedState::new("transit_gateway", "tgw")
            .with("gw_size", FieldValue::str("c5.xlarge"))
            .with("bgp_hold_time", FieldValue::Int(180))
            .with("advertised_cidrs", FieldValue::list(["10.0.0.0/16", "FD00::/8"]))
            .with("prepend_as_path", FieldValue::list(["65001", "65002"]))
            .with("tags", FieldValue::map([("env", "prod")]))
            .with("public_ip", FieldValue::str("1.2.3.4"))
    }

    fn desired() -> DesiredConfig {
        DesiredConfig::new("transit_gateway", "tgw")
            .with("gw_size", FieldValue::str("c5.xlarge"))
            .with("advertised_cidrs", FieldValue::list(["fd00::/8", "10.0.0.0/16"]))
            .with("prepend_as_path", FieldValue::list(["65001", "65002"]))
            .with("tags", FieldValue::map([("env", "prod")]))
    }

    #[test]
    fn test_unchanged_config_is_empty() {
        let changes = diff(&schema(), Some(&observed()), &desired());
        assert!(changes.is_empty(), "unexpected changes: {changes:?}");
    }

    #[test]
    fn test_positional_list_order_matters() {
        let d = desired().with("prepend_as_path", FieldValue::list(["65002", "65001"]));
        let changes = diff(&schema(), Some(&observed()), &d);
        assert_eq!(changes.fields().collect::<Vec<_>>(), vec!["prepend_as_path"]);
    }

    #[test]
    fn test_absent_field_reverts_to_default() {
        let o = observed().with("bgp_hold_time", FieldValue::Int(90));
        let changes = diff(&schema(), Some(&o), &desired());
        let change = changes.get("bgp_hold_time").unwrap();
        assert_eq!(change.old, FieldValue::Int(90));
        assert_eq!(change.new, FieldValue::Int(180));
    }

    #[test]
    fn test_computed_fields_ignored() {
        let o = observed().with("public_ip", FieldValue::str("5.6.7.8"));
        assert!(diff(&schema(), Some(&o), &desired()).is_empty());
    }

    #[test]
    fn test_no_observed_state_compares_with_defaults() {
        let changes = diff(&schema(), None, &desired());
        assert_eq!(
            changes.fields().collect::<Vec<_>>(),
            vec!["gw_size", "advertised_cidrs", "prepend_as_path", "tags"]
        );
    }
}
