//! Configuration validator
//!
//! Rules run in declaration order and the first violation wins. The
//! validator is a pure function of the schema, the desired record and the
//! cloud type.

use crate::capability::{CloudType, CloudTypes};
use crate::diff::ChangeSet;
use crate::error::{CloudError, Result};
use crate::record::DesiredConfig;
use crate::schema::{FieldRole, ResourceSchema};
use crate::value::FieldValue;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    UnknownCloud,
    UnsupportedCloud,
    Required,
    MutuallyExclusive,
    ConditionalRequirement,
    CloudScope,
    Coupling,
    Range,
    Enumeration,
    Format,
    HaIncomplete,
    ChangeNotAllowed,
}

/// A single rejected constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub fields: Vec<String>,
    pub message: String,
}

impl Violation {
    fn new(kind: ViolationKind, fields: &[&str], message: impl Into<String>) -> Self {
        Self {
            kind,
            fields: fields.iter().map(|f| f.to_string()).collect(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// One constraint over a desired record.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// Both fields carry the same meaning; at most one may be set.
    MutuallyExclusive {
        first: &'static str,
        second: &'static str,
    },
    /// `field` being set needs at least one of `any_of` set as well.
    Requires {
        field: &'static str,
        any_of: &'static [&'static str],
    },
    /// `field` may only be set when `toggle` is explicitly false.
    RequiresFalse {
        field: &'static str,
        toggle: &'static str,
    },
    /// `field` is only legal on `clouds`.
    CloudScoped {
        field: &'static str,
        clouds: CloudTypes,
    },
    /// `field` must be set on `clouds` (optionally only while `when` is true).
    RequiredOnCloud {
        field: &'static str,
        clouds: CloudTypes,
        when: Option<&'static str>,
    },
    /// `dependent` may only be true while `primary` is true.
    Coupled {
        dependent: &'static str,
        primary: &'static str,
    },
    /// `forbidden` must stay unset while `field` is set.
    Forbids {
        field: &'static str,
        forbidden: &'static str,
    },
    IntRange {
        field: &'static str,
        min: i64,
        max: i64,
    },
    OneOf {
        field: &'static str,
        values: &'static [&'static str],
    },
    /// Every string in the field parses as a CIDR.
    Cidr { field: &'static str },
    /// Mandatory HA fields are present whenever HA is wanted.
    HaComplete,
}

impl Rule {
    pub fn exclusive(first: &'static str, second: &'static str) -> Self {
        Rule::MutuallyExclusive { first, second }
    }

    pub fn requires(field: &'static str, any_of: &'static [&'static str]) -> Self {
        Rule::Requires { field, any_of }
    }

    pub fn requires_false(field: &'static str, toggle: &'static str) -> Self {
        Rule::RequiresFalse { field, toggle }
    }

    pub fn cloud_scoped(field: &'static str, clouds: CloudTypes) -> Self {
        Rule::CloudScoped { field, clouds }
    }

    pub fn required_on(field: &'static str, clouds: CloudTypes) -> Self {
        Rule::RequiredOnCloud {
            field,
            clouds,
            when: None,
        }
    }

    pub fn required_on_when(field: &'static str, clouds: CloudTypes, when: &'static str) -> Self {
        Rule::RequiredOnCloud {
            field,
            clouds,
            when: Some(when),
        }
    }

    pub fn coupled(dependent: &'static str, primary: &'static str) -> Self {
        Rule::Coupled { dependent, primary }
    }

    pub fn forbids(field: &'static str, forbidden: &'static str) -> Self {
        Rule::Forbids { field, forbidden }
    }

    pub fn range(field: &'static str, min: i64, max: i64) -> Self {
        Rule::IntRange { field, min, max }
    }

    pub fn one_of(field: &'static str, values: &'static [&'static str]) -> Self {
        Rule::OneOf { field, values }
    }

    pub fn cidr(field: &'static str) -> Self {
        Rule::Cidr { field }
    }

    fn check(
        &self,
        schema: &ResourceSchema,
        cfg: &DesiredConfig,
        cloud: CloudType,
    ) -> Option<Violation> {
        use ViolationKind::*;

        match *self {
            Rule::MutuallyExclusive { first, second } => (cfg.is_set(first)
                && cfg.is_set(second))
            .then(|| {
                Violation::new(
                    MutuallyExclusive,
                    &[first, second],
                    format!("'{first}' and '{second}' cannot both be set"),
                )
            }),
            Rule::Requires { field, any_of } => (cfg.is_set(field)
                && !any_of.iter().any(|f| cfg.is_set(f)))
            .then(|| {
                let wanted = any_of
                    .iter()
                    .map(|f| format!("'{f}'"))
                    .collect::<Vec<_>>()
                    .join(" or ");
                let mut fields = vec![field];
                fields.extend_from_slice(any_of);
                Violation::new(
                    ConditionalRequirement,
                    &fields,
                    format!("'{field}' requires {wanted} to be set"),
                )
            }),
            Rule::RequiresFalse { field, toggle } => (cfg.is_set(field)
                && !cfg.is_explicit_false(toggle))
            .then(|| {
                Violation::new(
                    ConditionalRequirement,
                    &[field, toggle],
                    format!("'{field}' can only be set when '{toggle}' is false"),
                )
            }),
            Rule::CloudScoped { field, clouds } => (cfg.is_set(field)
                && !cloud.supports(clouds))
            .then(|| {
                Violation::new(
                    CloudScope,
                    &[field],
                    format!("'{field}' is only supported for {clouds}, not {cloud}"),
                )
            }),
            Rule::RequiredOnCloud {
                field,
                clouds,
                when,
            } => (cloud.supports(clouds)
                && when.is_none_or(|w| cfg.is_true(w))
                && !cfg.is_set(field))
            .then(|| {
                let condition = when
                    .map(|w| format!(" when '{w}' is enabled"))
                    .unwrap_or_default();
                Violation::new(
                    Required,
                    &[field],
                    format!("'{field}' is required for {cloud}{condition}"),
                )
            }),
            Rule::Coupled { dependent, primary } => (cfg.is_true(dependent)
                && !cfg.is_true(primary))
            .then(|| {
                Violation::new(
                    Coupling,
                    &[dependent, primary],
                    format!("'{dependent}' requires '{primary}' to be enabled"),
                )
            }),
            Rule::Forbids { field, forbidden } => (cfg.is_set(field)
                && cfg.is_set(forbidden))
            .then(|| {
                Violation::new(
                    MutuallyExclusive,
                    &[field, forbidden],
                    format!("'{forbidden}' is not supported while '{field}' is enabled"),
                )
            }),
            Rule::IntRange { field, min, max } => cfg
                .get(field)
                .and_then(FieldValue::as_int)
                .filter(|v| *v < min || *v > max)
                .map(|v| {
                    Violation::new(
                        Range,
                        &[field],
                        format!("'{field}' must be between {min} and {max}, got {v}"),
                    )
                }),
            Rule::OneOf { field, values } => {
                let v = cfg.str(field);
                (cfg.is_set(field) && !values.contains(&v)).then(|| {
                    Violation::new(
                        Enumeration,
                        &[field],
                        format!("'{field}' must be one of: {}, got '{v}'", values.join(", ")),
                    )
                })
            }
            Rule::Cidr { field } => {
                let items: Vec<&str> = match cfg.get(field) {
                    Some(FieldValue::Str(s)) if !s.is_empty() => vec![s.as_str()],
                    Some(FieldValue::List(items)) => items.iter().map(String::as_str).collect(),
                    _ => Vec::new(),
                };
                items
                    .into_iter()
                    .find(|s| s.trim().parse::<ipnet::IpNet>().is_err())
                    .map(|bad| {
                        Violation::new(
                            Format,
                            &[field],
                            format!("'{field}' is not a valid CIDR: '{bad}'"),
                        )
                    })
            }
            Rule::HaComplete => {
                let ha = schema.ha.as_ref()?;
                if !ha.triggers.iter().any(|t| cfg.is_set(t)) {
                    return None;
                }
                ha.mandatory_for(cloud)
                    .find(|f| !cfg.is_set(f))
                    .map(|missing| {
                        Violation::new(
                            HaIncomplete,
                            &[missing],
                            format!("'{missing}' is required to enable HA on {cloud}"),
                        )
                    })
            }
        }
    }
}

fn walk(
    schema: &ResourceSchema,
    cfg: &DesiredConfig,
    cloud: CloudType,
    first_only: bool,
) -> Vec<Violation> {
    if !cloud.is_known() {
        return vec![Violation::new(
            ViolationKind::UnknownCloud,
            &["cloud_type"],
            format!("cloud_type {} is not a known cloud type", cloud.raw()),
        )];
    }
    if !cloud.supports(schema.clouds) {
        return vec![Violation::new(
            ViolationKind::UnsupportedCloud,
            &["cloud_type"],
            format!("'{}' is not supported for {cloud}", schema.family),
        )];
    }

    let mut found = Vec::new();

    for spec in schema.fields.iter().filter(|f| f.required) {
        let present = match cfg.get(spec.name) {
            Some(FieldValue::Bool(_)) => true,
            Some(v) => v.is_populated(),
            None => false,
        };
        if !present {
            found.push(Violation::new(
                ViolationKind::Required,
                &[spec.name],
                format!("'{}' is required", spec.name),
            ));
            if first_only {
                return found;
            }
        }
    }

    for rule in &schema.rules {
        if let Some(v) = rule.check(schema, cfg, cloud) {
            tracing::debug!(rule = ?rule, "rule rejected {}", cfg.name());
            found.push(v);
            if first_only {
                return found;
            }
        }
    }

    found
}

/// Every violation, in rule order.
pub fn violations(schema: &ResourceSchema, cfg: &DesiredConfig, cloud: CloudType) -> Vec<Violation> {
    walk(schema, cfg, cloud, false)
}

/// Fail with the first violation, if any.
pub fn validate(schema: &ResourceSchema, cfg: &DesiredConfig, cloud: CloudType) -> Result<()> {
    match walk(schema, cfg, cloud, true).into_iter().next() {
        Some(v) => Err(CloudError::Validation(v)),
        None => Ok(()),
    }
}

/// Reject in-place changes to fields that can only be set at creation.
pub fn validate_changes(schema: &ResourceSchema, changes: &ChangeSet) -> Result<()> {
    for change in changes.iter() {
        let create_only = schema
            .get(&change.field)
            .is_some_and(|f| matches!(f.role, FieldRole::CreateOnly));
        if create_only {
            return Err(CloudError::Validation(Violation::new(
                ViolationKind::ChangeNotAllowed,
                &[change.field.as_str()],
                format!("updating '{}' is not allowed", change.field),
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, HaSpec};
    use crate::value::FieldType;

    fn schema() -> ResourceSchema {
        ResourceSchema::new("gateway", "gw_name", CloudTypes::CLOUD)
            .field(FieldSpec::new("cloud_type", FieldType::Int, FieldRole::CreateOnly).required())
            .field(FieldSpec::new("gw_size", FieldType::Str, FieldRole::CreateOnly).required())
            .rules([
                Rule::cloud_scoped("zone", CloudTypes::AZURE_RELATED),
                Rule::HaComplete,
                Rule::coupled("enable_active_standby_preemptive", "enable_active_standby"),
                Rule::requires("bgp_manual_spoke_advertise_cidrs", &["enable_bgp"]),
                Rule::cidr("bgp_manual_spoke_advertise_cidrs"),
                Rule::range("bgp_hold_time", 12, 360),
                Rule::one_of("learned_cidrs_approval_mode", &["gateway", "connection"]),
                Rule::requires_false("eip", "allocate_new_eip"),
            ])
            .ha(HaSpec {
                kind: "gateway_ha",
                suffix: "-hagw",
                triggers: vec!["ha_subnet", "ha_zone"],
                mandatory: vec![
                    (CloudTypes::CLOUD, "ha_gw_size"),
                    (CloudTypes::OCI_RELATED, "ha_availability_domain"),
                ],
                placement: vec!["ha_subnet", "ha_zone"],
                size_field: "ha_gw_size",
                observed_marker: "ha_gw_name",
                create: "create_ha_gateway",
                delete: "delete_ha_gateway",
                resize: "update_ha_gateway_size",
            })
    }

    fn base() -> DesiredConfig {
        DesiredConfig::new("gateway", "gw-1")
            .with("cloud_type", FieldValue::Int(1))
            .with("gw_size", FieldValue::str("t3.small"))
    }

    fn first(cfg: &DesiredConfig, cloud: CloudType) -> Option<Violation> {
        match validate(&schema(), cfg, cloud) {
            Ok(()) => None,
            Err(CloudError::Validation(v)) => Some(v),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(first(&base(), CloudType::AWS).is_none());
    }

    #[test]
    fn test_unknown_cloud_is_rejected() {
        let v = first(&base(), CloudType::from_raw(3)).unwrap();
        assert_eq!(v.kind, ViolationKind::UnknownCloud);
    }

    #[test]
    fn test_preemptive_requires_active_standby() {
        let cfg = base()
            .with("enable_active_standby_preemptive", FieldValue::Bool(true))
            .with("enable_active_standby", FieldValue::Bool(false));
        let v = first(&cfg, CloudType::AWS).unwrap();
        assert_eq!(v.kind, ViolationKind::Coupling);
        assert_eq!(
            v.message,
            "'enable_active_standby_preemptive' requires 'enable_active_standby' to be enabled"
        );
    }

    #[test]
    fn test_cloud_scoped_field() {
        let cfg = base().with("zone", FieldValue::str("1"));
        let v = first(&cfg, CloudType::AWS).unwrap();
        assert_eq!(v.kind, ViolationKind::CloudScope);

        let azure = cfg.with("cloud_type", FieldValue::Int(8));
        assert!(first(&azure, CloudType::AZURE).is_none());
    }

    #[test]
    fn test_ha_requires_size() {
        let cfg = base().with("ha_subnet", FieldValue::str("10.0.2.0/24"));
        let v = first(&cfg, CloudType::AWS).unwrap();
        assert_eq!(v.kind, ViolationKind::HaIncomplete);
        assert_eq!(v.fields, vec!["ha_gw_size"]);

        let cfg = cfg.with("ha_gw_size", FieldValue::str("t3.small"));
        assert!(first(&cfg, CloudType::AWS).is_none());
        // OCI additionally needs a domain
        let v = first(&cfg, CloudType::OCI).unwrap();
        assert_eq!(v.fields, vec!["ha_availability_domain"]);
    }

    #[test]
    fn test_range_and_enumeration() {
        let cfg = base().with("bgp_hold_time", FieldValue::Int(5));
        assert_eq!(first(&cfg, CloudType::AWS).unwrap().kind, ViolationKind::Range);

        let cfg = base().with("learned_cidrs_approval_mode", FieldValue::str("tunnel"));
        assert_eq!(
            first(&cfg, CloudType::AWS).unwrap().kind,
            ViolationKind::Enumeration
        );
    }

    #[test]
    fn test_requires_explicit_false() {
        let cfg = base().with("eip", FieldValue::str("52.1.1.1"));
        assert!(first(&cfg, CloudType::AWS).is_some());
        let cfg = cfg.with("allocate_new_eip", FieldValue::Bool(false));
        assert!(first(&cfg, CloudType::AWS).is_none());
    }

    #[test]
    fn test_first_violation_is_deterministic() {
        let cfg = base()
            .with("zone", FieldValue::str("1"))
            .with("bgp_hold_time", FieldValue::Int(1))
            .with(
                "bgp_manual_spoke_advertise_cidrs",
                FieldValue::list(["not-a-cidr"]),
            );
        let a = first(&cfg, CloudType::AWS).unwrap();
        let b = first(&cfg, CloudType::AWS).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.kind, ViolationKind::CloudScope);

        let all = violations(&schema(), &cfg, CloudType::AWS);
        let kinds: Vec<_> = all.iter().map(|v| v.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ViolationKind::CloudScope,
                ViolationKind::ConditionalRequirement,
                ViolationKind::Format,
                ViolationKind::Range,
            ]
        );
    }

    #[test]
    fn test_missing_required_field() {
        let cfg = DesiredConfig::new("gateway", "gw-1").with("cloud_type", FieldValue::Int(1));
        let v = first(&cfg, CloudType::AWS).unwrap();
        assert_eq!(v.kind, ViolationKind::Required);
        assert_eq!(v.fields, vec!["gw_size"]);
    }
}
