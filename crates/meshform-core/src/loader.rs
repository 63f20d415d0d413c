//! Loader
//!
//! Ties template expansion and parsing together.

use crate::error::{FlowError, Result};
use crate::model::Manifest;
use crate::parser::parse_kdl_string;
use crate::template::{TemplateProcessor, extract_variables};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Load a resource file.
///
/// 1. Collect variables: environment (`MESHFORM_VAR_*`), a `.env` next to
///    the file, then the file's own `variables` blocks
/// 2. Expand templates
/// 3. Parse KDL into desired records
#[instrument(fields(path = %path.display()))]
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path).map_err(|e| FlowError::IoError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let project_dir = path.parent().unwrap_or(Path::new("."));
    let mut processor = TemplateProcessor::new();
    processor.add_variable(
        "PROJECT_ROOT",
        serde_json::Value::String(project_dir.to_string_lossy().to_string()),
    );
    processor.add_env_variables();

    let env_file = project_dir.join(".env");
    if env_file.is_file() {
        debug!(file = %env_file.display(), "Found .env file");
        processor.add_env_file_variables(&env_file)?;
    }

    let name = project_dir
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
        .unwrap_or_else(|| "unnamed".to_string());

    let manifest = render_and_parse(&content, name, &mut processor).map_err(|e| match e {
        FlowError::TemplateRenderError(message) => FlowError::TemplateError {
            file: path.to_path_buf(),
            message,
        },
        other => other,
    })?;

    info!(
        project = %manifest.name,
        resources = manifest.len(),
        "Resource file loaded"
    );
    Ok(manifest)
}

/// Load from a string with no environment lookups
pub fn load_manifest_str(content: &str, default_name: &str) -> Result<Manifest> {
    let mut processor = TemplateProcessor::new();
    render_and_parse(content, default_name.to_string(), &mut processor)
}

fn render_and_parse(
    content: &str,
    name: String,
    processor: &mut TemplateProcessor,
) -> Result<Manifest> {
    let variables = extract_variables(content)?;
    debug!(count = variables.len(), "Extracted variables");
    processor.add_variables(variables);

    let expanded = processor.render_str(content)?;
    parse_kdl_string(&expanded, name)
}
