//! Meshform resource files
//!
//! Loads KDL resource files into the desired records the engine reconciles.
//! Values are normalized with each family's schema, so `single_ip_snat "yes"`
//! and `single_ip_snat #true` produce the same record.

pub mod error;
pub mod loader;
pub mod model;
pub mod parser;
pub mod template;

pub use error::{FlowError, Result};
pub use loader::{load_manifest, load_manifest_str};
pub use model::Manifest;
pub use parser::{parse_kdl_file, parse_kdl_string, parse_resource};
pub use template::{TemplateProcessor, Variables, extract_variables};
