//! Typed field values
//!
//! Desired configuration and controller snapshots both arrive untyped. They
//! are normalized into [`FieldValue`] using the field's declared
//! [`FieldType`] before anything compares or validates them.

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A single structured record, e.g. one BGP-over-LAN interface.
pub type Record = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<String>),
    Map(BTreeMap<String, String>),
    Records(Vec<Record>),
}

impl FieldValue {
    pub fn str(value: impl Into<String>) -> Self {
        FieldValue::Str(value.into())
    }

    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldValue::List(items.into_iter().map(Into::into).collect())
    }

    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        FieldValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Whether the value carries meaning: non-empty strings and collections,
    /// `true`, and any integer.
    pub fn is_populated(&self) -> bool {
        match self {
            FieldValue::Bool(b) => *b,
            FieldValue::Int(_) => true,
            FieldValue::Str(s) => !s.is_empty(),
            FieldValue::List(items) => !items.is_empty(),
            FieldValue::Map(entries) => !entries.is_empty(),
            FieldValue::Records(records) => !records.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Int(i) => serde_json::Value::from(*i),
            FieldValue::Str(s) => serde_json::Value::String(s.clone()),
            FieldValue::List(items) => serde_json::json!(items),
            FieldValue::Map(entries) => serde_json::json!(entries),
            FieldValue::Records(records) => serde_json::json!(records),
        }
    }
}

/// Keys of a structured record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSpec {
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
}

impl RecordSpec {
    /// Reject records with missing required keys or keys the `RecordSpec` doesn't declare.
    pub fn check(&self, field: &str, record: &Record) -> Result<()> {
        for key in self.required {
            if record.get(*key).is_none_or(|v| v.is_empty()) {
                return Err(invalid(field, format!("record is missing required key '{key}'")));
            }
        }
        for key in record.keys() {
            if !self.required.contains(&key.as_str()) && !self.optional.contains(&key.as_str()) {
                return Err(invalid(field, format!("unknown record key '{key}'")));
            }
        }
        Ok(())
    }
}

/// Declared type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Str,
    Bool,
    Int,
    /// Unordered string collection.
    StrSet,
    /// Ordered string collection.
    StrList,
    Map,
    Records(RecordSpec),
}

impl FieldType {
    /// Value a field of this type takes when nobody set it.
    pub fn neutral(self) -> FieldValue {
        match self {
            FieldType::Str => FieldValue::Str(String::new()),
            FieldType::Bool => FieldValue::Bool(false),
            FieldType::Int => FieldValue::Int(0),
            FieldType::StrSet | FieldType::StrList => FieldValue::List(Vec::new()),
            FieldType::Map => FieldValue::Map(BTreeMap::new()),
            FieldType::Records(_) => FieldValue::Records(Vec::new()),
        }
    }

    /// Equality the differencer uses when the schema doesn't override it.
    pub fn default_equality(self) -> Equality {
        match self {
            FieldType::StrSet | FieldType::Map | FieldType::Records(_) => Equality::Unordered,
            FieldType::StrList => Equality::Positional,
            FieldType::Str | FieldType::Bool | FieldType::Int => Equality::Exact,
        }
    }

    /// Normalize an untyped JSON value into this type.
    ///
    /// Controllers report booleans as `"yes"`/`"true"` strings and lists as
    /// comma separated strings, both are accepted. `null` maps to the
    /// neutral value.
    pub fn normalize(self, field: &str, value: &serde_json::Value) -> Result<FieldValue> {
        use serde_json::Value;

        if value.is_null() {
            return Ok(self.neutral());
        }

        match self {
            FieldType::Str => match value {
                Value::String(s) => Ok(FieldValue::Str(s.clone())),
                Value::Number(n) => Ok(FieldValue::Str(n.to_string())),
                Value::Bool(b) => Ok(FieldValue::Str(b.to_string())),
                _ => Err(invalid(field, "expected a string")),
            },
            FieldType::Bool => match value {
                Value::Bool(b) => Ok(FieldValue::Bool(*b)),
                Value::String(s) => parse_bool(s)
                    .map(FieldValue::Bool)
                    .ok_or_else(|| invalid(field, format!("expected a boolean, got '{s}'"))),
                _ => Err(invalid(field, "expected a boolean")),
            },
            FieldType::Int => match value {
                Value::Number(n) => n
                    .as_i64()
                    .map(FieldValue::Int)
                    .ok_or_else(|| invalid(field, format!("expected an integer, got {n}"))),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(FieldValue::Int)
                    .map_err(|_| invalid(field, format!("expected an integer, got '{s}'"))),
                _ => Err(invalid(field, "expected an integer")),
            },
            FieldType::StrSet | FieldType::StrList => match value {
                Value::Array(items) => items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => Ok(s.clone()),
                        Value::Number(n) => Ok(n.to_string()),
                        _ => Err(invalid(field, "expected a list of strings")),
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(FieldValue::List),
                Value::String(s) => Ok(FieldValue::List(split_list(s))),
                _ => Err(invalid(field, "expected a list of strings")),
            },
            FieldType::Map => match value {
                Value::Object(entries) => entries
                    .iter()
                    .map(|(k, v)| match v {
                        Value::String(s) => Ok((k.clone(), s.clone())),
                        Value::Number(n) => Ok((k.clone(), n.to_string())),
                        Value::Bool(b) => Ok((k.clone(), b.to_string())),
                        _ => Err(invalid(field, format!("map value for '{k}' must be scalar"))),
                    })
                    .collect::<Result<BTreeMap<_, _>>>()
                    .map(FieldValue::Map),
                _ => Err(invalid(field, "expected a map")),
            },
            FieldType::Records(spec) => match value {
                Value::Array(items) => {
                    let mut records = Vec::with_capacity(items.len());
                    for item in items {
                        let Value::Object(entries) = item else {
                            return Err(invalid(field, "expected a list of records"));
                        };
                        let mut record = Record::new();
                        for (k, v) in entries {
                            let v = match v {
                                Value::String(s) => s.clone(),
                                Value::Number(n) => n.to_string(),
                                Value::Bool(b) => b.to_string(),
                                _ => {
                                    return Err(invalid(
                                        field,
                                        format!("record value for '{k}' must be scalar"),
                                    ));
                                }
                            };
                            record.insert(k.clone(), v);
                        }
                        spec.check(field, &record)?;
                        records.push(record);
                    }
                    Ok(FieldValue::Records(records))
                }
                _ => Err(invalid(field, "expected a list of records")),
            },
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "enabled" => Some(true),
        "false" | "no" | "disabled" | "" => Some(false),
        _ => None,
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn invalid(field: &str, message: impl Into<String>) -> CloudError {
    CloudError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

/// How the differencer decides two values of a field are the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Equality {
    Exact,
    /// Collections compared as sets, maps by key/value.
    Unordered,
    /// Set comparison ignoring ASCII case, for CIDR lists the controller
    /// reorders and re-cases.
    UnorderedCaseInsensitive,
    /// Collections compared element by element.
    Positional,
}

impl Equality {
    pub fn same(self, a: &FieldValue, b: &FieldValue) -> bool {
        match (self, a, b) {
            (Equality::Unordered, FieldValue::List(x), FieldValue::List(y)) => {
                x.iter().collect::<BTreeSet<_>>() == y.iter().collect::<BTreeSet<_>>()
            }
            (Equality::UnorderedCaseInsensitive, FieldValue::List(x), FieldValue::List(y)) => {
                let fold = |items: &[String]| {
                    items
                        .iter()
                        .map(|s| s.trim().to_ascii_lowercase())
                        .collect::<BTreeSet<_>>()
                };
                fold(x) == fold(y)
            }
            (Equality::UnorderedCaseInsensitive, FieldValue::Str(x), FieldValue::Str(y)) => {
                x.eq_ignore_ascii_case(y)
            }
            (Equality::Unordered, FieldValue::Records(x), FieldValue::Records(y)) => {
                x.iter().collect::<BTreeSet<_>>() == y.iter().collect::<BTreeSet<_>>()
            }
            _ => a == b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_controller_booleans() {
        let v = FieldType::Bool.normalize("enable_nat", &json!("yes")).unwrap();
        assert_eq!(v, FieldValue::Bool(true));
        let v = FieldType::Bool.normalize("enable_nat", &json!(false)).unwrap();
        assert_eq!(v, FieldValue::Bool(false));
        assert!(FieldType::Bool.normalize("enable_nat", &json!("maybe")).is_err());
    }

    #[test]
    fn test_normalize_comma_separated_list() {
        let v = FieldType::StrSet
            .normalize("cidrs", &json!("10.0.0.0/16, 10.1.0.0/16"))
            .unwrap();
        assert_eq!(v, FieldValue::list(["10.0.0.0/16", "10.1.0.0/16"]));
        let v = FieldType::StrSet.normalize("cidrs", &json!("")).unwrap();
        assert_eq!(v, FieldValue::List(vec![]));
    }

    #[test]
    fn test_normalize_int_from_string() {
        let v = FieldType::Int.normalize("bgp_hold_time", &json!("180")).unwrap();
        assert_eq!(v, FieldValue::Int(180));
        assert!(FieldType::Int.normalize("bgp_hold_time", &json!("x")).is_err());
    }

    #[test]
    fn test_null_is_neutral() {
        let v = FieldType::Map.normalize("tags", &json!(null)).unwrap();
        assert_eq!(v, FieldValue::Map(BTreeMap::new()));
    }

    #[test]
    fn test_records_are_checked() {
        const LAN: RecordSpec = RecordSpec {
            required: &["vpc_id", "subnet"],
            optional: &["ha_subnet"],
        };
        let ok = FieldType::Records(LAN)
            .normalize("bgp_lan_interfaces", &json!([{"vpc_id": "vpc-1", "subnet": "10.0.0.0/24"}]))
            .unwrap();
        assert!(ok.is_populated());

        let missing = FieldType::Records(LAN)
            .normalize("bgp_lan_interfaces", &json!([{"vpc_id": "vpc-1"}]));
        assert!(missing.is_err());

        let unknown = FieldType::Records(LAN).normalize(
            "bgp_lan_interfaces",
            &json!([{"vpc_id": "vpc-1", "subnet": "10.0.0.0/24", "mtu": 9000}]),
        );
        assert!(unknown.is_err());
    }

    #[test]
    fn test_equality_rules() {
        let a = FieldValue::list(["10.0.0.0/16", "10.1.0.0/16"]);
        let b = FieldValue::list(["10.1.0.0/16", "10.0.0.0/16"]);
        assert!(Equality::Unordered.same(&a, &b));
        assert!(!Equality::Positional.same(&a, &b));

        let upper = FieldValue::list(["2001:DB8::/32"]);
        let lower = FieldValue::list(["2001:db8::/32"]);
        assert!(Equality::UnorderedCaseInsensitive.same(&upper, &lower));
        assert!(!Equality::Unordered.same(&upper, &lower));
    }

    #[test]
    fn test_populated() {
        assert!(!FieldValue::str("").is_populated());
        assert!(!FieldValue::Bool(false).is_populated());
        assert!(FieldValue::Int(0).is_populated());
        assert!(FieldValue::list(["a"]).is_populated());
    }
}
