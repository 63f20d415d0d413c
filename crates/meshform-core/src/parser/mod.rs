//! KDL parser
//!
//! Top-level nodes are `project`, `variables`, and one node per resource
//! named after its family (`vpc`, `gateway`, `transit_gateway`, ...).

mod resource;

pub use resource::parse_resource;

use crate::error::{FlowError, Result};
use crate::model::Manifest;
use crate::template::kdl_value_to_json;
use kdl::KdlDocument;
use std::fs;
use std::path::Path;

/// Parse a resource file. The project name defaults to the file's directory.
pub fn parse_kdl_file<P: AsRef<Path>>(path: P) -> Result<Manifest> {
    let content = fs::read_to_string(path.as_ref())?;
    let name = path
        .as_ref()
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    parse_kdl_string(&content, name)
}

pub fn parse_kdl_string(content: &str, default_name: String) -> Result<Manifest> {
    let doc: KdlDocument = content.parse()?;
    let mut manifest = Manifest::new(default_name);

    for node in doc.nodes() {
        match node.name().value() {
            "project" => {
                if let Some(project_name) =
                    node.entries().first().and_then(|e| e.value().as_string())
                {
                    manifest.name = project_name.to_string();
                }
            }
            "variables" => {
                if let Some(vars) = node.children() {
                    for var in vars.nodes() {
                        let value = match var.entries().first().map(|e| kdl_value_to_json(e.value()))
                        {
                            Some(serde_json::Value::String(s)) => s,
                            Some(other) => other.to_string(),
                            None => String::new(),
                        };
                        manifest
                            .variables
                            .insert(var.name().value().to_string(), value);
                    }
                }
            }
            _ => {
                let resource = parse_resource(node)?;
                if manifest.contains(resource.family(), resource.name()) {
                    return Err(FlowError::DuplicateResource {
                        family: resource.family().to_string(),
                        name: resource.name().to_string(),
                    });
                }
                manifest.resources.push(resource);
            }
        }
    }

    Ok(manifest)
}
