//! Declarative resource family schemas
//!
//! A family supplies its field list, equality rules, validation rules, HA
//! pairing and token bindings as data. The validator, differencer and
//! orchestrator are generic over this description.

use crate::capability::{CloudType, CloudTypes};
use crate::token::TokenFamily;
use crate::validate::Rule;
use crate::value::{Equality, FieldType, FieldValue};

/// What a field does once the resource exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// Sent with the create call, changing it afterwards is rejected.
    CreateOnly,
    /// Sent with the create call, changed in place by a structural update.
    Resize { operation: &'static str },
    /// Boolean feature switch.
    Toggle {
        enable: &'static str,
        disable: &'static str,
    },
    /// Value applied by a single update operation.
    Setting { operation: &'static str },
    /// Value that must be cleared before a different one is set.
    Replace {
        clear: &'static str,
        set: &'static str,
    },
    /// Tag/label map, applied after everything else.
    Tags { operation: &'static str },
    /// Secondary (HA) node attribute.
    Ha,
    /// Reported by the controller, never diffed.
    Computed,
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub role: FieldRole,
    pub default: Option<FieldValue>,
    pub equality: Equality,
    pub required: bool,
}

impl FieldSpec {
    pub fn new(name: &'static str, field_type: FieldType, role: FieldRole) -> Self {
        Self {
            name,
            field_type,
            role,
            default: None,
            equality: field_type.default_equality(),
            required: false,
        }
    }

    pub fn with_default(mut self, default: FieldValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_equality(mut self, equality: Equality) -> Self {
        self.equality = equality;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Declared default, or the type's neutral value.
    pub fn default_value(&self) -> FieldValue {
        self.default
            .clone()
            .unwrap_or_else(|| self.field_type.neutral())
    }

    /// Whether the field is part of the create call payload.
    pub fn in_create_payload(&self) -> bool {
        matches!(self.role, FieldRole::CreateOnly | FieldRole::Resize { .. })
    }
}

/// Secondary node description for families that support HA pairing.
#[derive(Debug, Clone)]
pub struct HaSpec {
    /// Remote kind of the secondary node.
    pub kind: &'static str,
    /// Suffix appended to the primary's name to name the secondary.
    pub suffix: &'static str,
    /// Any of these being set in the desired record means HA is wanted.
    pub triggers: Vec<&'static str>,
    /// Fields that must be set when HA is wanted, per cloud union.
    pub mandatory: Vec<(CloudTypes, &'static str)>,
    /// Placement fields; changing any of them recreates the secondary.
    pub placement: Vec<&'static str>,
    /// Instance size field; changing only this resizes in place.
    pub size_field: &'static str,
    /// Snapshot field carrying the secondary's name when it exists.
    pub observed_marker: &'static str,
    pub create: &'static str,
    pub delete: &'static str,
    pub resize: &'static str,
}

impl HaSpec {
    pub fn secondary_name(&self, primary: &str) -> String {
        format!("{}{}", primary, self.suffix)
    }

    /// Mandatory HA fields for `cloud`.
    pub fn mandatory_for(&self, cloud: CloudType) -> impl Iterator<Item = &'static str> + '_ {
        self.mandatory
            .iter()
            .filter(move |(clouds, _)| cloud.supports(*clouds))
            .map(|(_, field)| *field)
    }
}

/// Packs `base` and `qualifiers` into one wire field for matching clouds.
#[derive(Debug, Clone)]
pub struct TokenBinding {
    pub base: &'static str,
    pub qualifiers: Vec<&'static str>,
    pub clouds: CloudTypes,
    /// Boolean field that must be true for the binding to apply.
    pub when: Option<&'static str>,
    pub family: TokenFamily,
}

impl TokenBinding {
    pub fn new(
        base: &'static str,
        qualifiers: Vec<&'static str>,
        clouds: CloudTypes,
        family: TokenFamily,
    ) -> Self {
        debug_assert_eq!(qualifiers.len() + 1, family.parts());
        Self {
            base,
            qualifiers,
            clouds,
            when: None,
            family,
        }
    }

    pub fn when(mut self, field: &'static str) -> Self {
        self.when = Some(field);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ResourceSchema {
    /// Family name used in resource files, e.g. `gateway`.
    pub family: &'static str,
    /// Kind passed to the remote operations interface.
    pub remote_kind: &'static str,
    /// Payload field carrying the resource's name.
    pub key_field: &'static str,
    /// Clouds the family exists on at all.
    pub clouds: CloudTypes,
    pub fields: Vec<FieldSpec>,
    pub rules: Vec<Rule>,
    pub ha: Option<HaSpec>,
    pub tokens: Vec<TokenBinding>,
}

impl ResourceSchema {
    pub fn new(family: &'static str, key_field: &'static str, clouds: CloudTypes) -> Self {
        Self {
            family,
            remote_kind: family,
            key_field,
            clouds,
            fields: Vec::new(),
            rules: Vec::new(),
            ha: None,
            tokens: Vec::new(),
        }
    }

    pub fn remote_kind(mut self, kind: &'static str) -> Self {
        self.remote_kind = kind;
        self
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn fields(mut self, specs: impl IntoIterator<Item = FieldSpec>) -> Self {
        self.fields.extend(specs);
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(mut self, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.rules.extend(rules);
        self
    }

    pub fn ha(mut self, ha: HaSpec) -> Self {
        self.ha = Some(ha);
        self
    }

    pub fn token(mut self, binding: TokenBinding) -> Self {
        self.tokens.push(binding);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields the differencer looks at, in declaration order.
    pub fn managed_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields
            .iter()
            .filter(|f| !matches!(f.role, FieldRole::Computed))
    }

    /// First binding that applies to `base` for this cloud and record.
    pub fn binding_for(
        &self,
        base: &str,
        cloud: CloudType,
        truthy: impl Fn(&str) -> bool,
    ) -> Option<&TokenBinding> {
        self.tokens.iter().find(|b| {
            b.base == base && cloud.supports(b.clouds) && b.when.is_none_or(|w| truthy(w))
        })
    }

    /// Whether `field` is folded into another field's wire token under some binding.
    pub fn is_qualifier(&self, field: &str) -> bool {
        self.tokens.iter().any(|b| b.qualifiers.contains(&field))
    }
}
