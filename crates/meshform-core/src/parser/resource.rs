//! Resource node parsing
//!
//! ```kdl
//! gateway "spoke-1" {
//!     cloud_type 1
//!     gw_size "t3.small"
//!     included_advertised_spoke_routes "10.0.0.0/16" "10.1.0.0/16"
//!     tags env="prod" team="net"
//! }
//! ```
//!
//! Entries are turned into JSON first and normalized by the family schema,
//! the same path controller snapshots take.

use crate::error::{FlowError, Result};
use crate::template::kdl_value_to_json;
use kdl::KdlNode;
use meshform_cloud::{DesiredConfig, FieldType, ResourceSchema, catalog};
use serde_json::{Map, Value};
use tracing::debug;

pub fn parse_resource(node: &KdlNode) -> Result<DesiredConfig> {
    let family = node.name().value();
    let schema = catalog::family(family).ok_or_else(|| FlowError::UnknownFamily(family.into()))?;

    let name = node
        .entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .ok_or_else(|| FlowError::MissingName {
            family: family.to_string(),
        })?
        .to_string();

    let mut object = Map::new();
    if let Some(children) = node.children() {
        for child in children.nodes() {
            let field = child.name().value();
            let value = field_value(schema, child).map_err(|message| {
                FlowError::InvalidResource {
                    family: family.to_string(),
                    name: name.clone(),
                    source: meshform_cloud::CloudError::InvalidValue {
                        field: field.to_string(),
                        message,
                    },
                }
            })?;
            if object.insert(field.to_string(), value).is_some() {
                debug!(family, name = %name, field, "Field declared twice, last one wins");
            }
        }
    }

    DesiredConfig::from_json(schema, name.clone(), &object).map_err(|source| {
        FlowError::InvalidResource {
            family: family.to_string(),
            name,
            source,
        }
    })
}

/// JSON for one field node, shaped by the field's declared type.
///
/// Fields unknown to the schema are passed through as scalars so the
/// normalizer reports them by name.
fn field_value(schema: &ResourceSchema, node: &KdlNode) -> std::result::Result<Value, String> {
    let field_type = schema.get(node.name().value()).map(|s| s.field_type);

    match field_type {
        Some(FieldType::StrSet | FieldType::StrList) => Ok(Value::Array(arguments(node))),
        Some(FieldType::Map) => Ok(Value::Object(map_entries(node))),
        Some(FieldType::Records(_)) => {
            let children = node
                .children()
                .ok_or_else(|| "expected one child node per record".to_string())?;
            Ok(Value::Array(
                children
                    .nodes()
                    .iter()
                    .map(|record| Value::Object(properties(record)))
                    .collect(),
            ))
        }
        _ => {
            let mut args = arguments(node);
            match args.len() {
                1 => Ok(args.remove(0)),
                0 => Err("expected a value".to_string()),
                n => Err(format!("expected a single value, got {n}")),
            }
        }
    }
}

fn arguments(node: &KdlNode) -> Vec<Value> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .map(|e| kdl_value_to_json(e.value()))
        .collect()
}

fn properties(node: &KdlNode) -> Map<String, Value> {
    node.entries()
        .iter()
        .filter_map(|e| {
            e.name()
                .map(|name| (name.value().to_string(), kdl_value_to_json(e.value())))
        })
        .collect()
}

/// `tags env="prod"` and `tags { env "prod" }` are equivalent.
fn map_entries(node: &KdlNode) -> Map<String, Value> {
    let mut entries = properties(node);
    if let Some(children) = node.children() {
        for child in children.nodes() {
            if let Some(entry) = child.entries().first() {
                entries.insert(
                    child.name().value().to_string(),
                    kdl_value_to_json(entry.value()),
                );
            }
        }
    }
    entries
}
