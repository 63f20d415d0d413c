//! Template expansion
//!
//! Resource files are rendered with Tera before they are parsed, so
//! `{{ account }}` may appear anywhere a value can.

use crate::error::{FlowError, Result};
use std::collections::HashMap;
use std::path::Path;
use tera::{Context, Tera};
use tracing::{debug, info};

/// Variable context
pub type Variables = HashMap<String, serde_json::Value>;

pub struct TemplateProcessor {
    tera: Tera,
    context: Context,
}

impl TemplateProcessor {
    pub fn new() -> Self {
        Self {
            tera: Tera::default(),
            context: Context::new(),
        }
    }

    pub fn add_variable(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.context.insert(key.into(), &value);
    }

    pub fn add_variables(&mut self, variables: Variables) {
        for (key, value) in variables {
            self.context.insert(key, &value);
        }
    }

    /// Expose environment variables with an allowed prefix.
    ///
    /// Only `MESHFORM_VAR_*` and `CI_*` are visible. `MESHFORM_VAR_` is
    /// stripped, so `MESHFORM_VAR_region` becomes `{{ region }}`.
    #[tracing::instrument(skip(self))]
    pub fn add_env_variables(&mut self) {
        const VAR_PREFIX: &str = "MESHFORM_VAR_";
        let mut count = 0;

        for (key, value) in std::env::vars() {
            let name = if let Some(stripped) = key.strip_prefix(VAR_PREFIX) {
                stripped.to_string()
            } else if key.starts_with("CI_") {
                key
            } else {
                continue;
            };
            debug!(key = %name, "Adding environment variable");
            self.context.insert(name, &serde_json::Value::String(value));
            count += 1;
        }

        info!(env_var_count = count, "Added filtered environment variables");
    }

    /// Add every `KEY=VALUE` line of a `.env` file.
    #[tracing::instrument(skip(self))]
    pub fn add_env_file_variables(&mut self, env_file_path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(env_file_path).map_err(|e| FlowError::IoError {
            path: env_file_path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut count = 0;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let value = strip_quotes(value.trim());
                self.context.insert(
                    key.trim(),
                    &serde_json::Value::String(value.to_string()),
                );
                count += 1;
            }
        }

        info!(
            env_file = %env_file_path.display(),
            variable_count = count,
            "Loaded variables from .env file"
        );
        Ok(())
    }

    pub fn render_str(&mut self, template: &str) -> Result<String> {
        self.tera
            .render_str(template, &self.context)
            .map_err(|e| FlowError::TemplateRenderError(extract_tera_error_detail(&e)))
    }

    pub fn render_file(&mut self, path: &Path) -> Result<String> {
        let content = std::fs::read_to_string(path).map_err(|e| FlowError::IoError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        self.render_str(&content).map_err(|e| match e {
            FlowError::TemplateRenderError(message) => FlowError::TemplateError {
                file: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }
}

impl Default for TemplateProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect the `variables { }` blocks of a resource file.
///
/// Blocks are cut out with a regex and parsed on their own, so template
/// expressions elsewhere in the file do not have to be valid KDL yet.
/// Later blocks override earlier ones.
pub fn extract_variables(kdl_content: &str) -> Result<Variables> {
    use regex::Regex;

    let re = Regex::new(r"(?s)(?:^|\n)\s*variables\s*\{(?P<content>.*?)\}")
        .map_err(|e| FlowError::InvalidConfig(format!("regex compile error: {e}")))?;

    let mut all_vars = HashMap::new();
    for cap in re.captures_iter(kdl_content) {
        let Some(var_content) = cap.name("content") else {
            continue;
        };
        let block = format!("extracted {{\n{}\n}}", var_content.as_str());
        let doc: kdl::KdlDocument = block.parse().map_err(|e| {
            FlowError::InvalidConfig(format!("KDL parse error in variables block: {e}"))
        })?;

        if let Some(children) = doc.nodes().first().and_then(|n| n.children()) {
            for var_node in children.nodes() {
                if let Some(entry) = var_node.entries().first() {
                    all_vars.insert(
                        var_node.name().value().to_string(),
                        kdl_value_to_json(entry.value()),
                    );
                }
            }
        }
    }

    Ok(all_vars)
}

fn strip_quotes(s: &str) -> &str {
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

/// Walk the Tera error chain and name the undefined variable when there is one.
fn extract_tera_error_detail(e: &tera::Error) -> String {
    use std::error::Error;

    let mut details = vec![e.to_string()];
    let mut source = e.source();
    while let Some(err) = source {
        details.push(err.to_string());
        source = err.source();
    }
    let full_error = details.join(" | ");

    if full_error.contains("not found in context")
        && let Some(start) = full_error.find("Variable `")
        && let Some(end) = full_error[start..].find("` not found")
    {
        let var_name = &full_error[start + 10..start + end];
        return format!(
            "undefined variable: `{var_name}`\nhint: define it in a variables block or export MESHFORM_VAR_{var_name}"
        );
    }

    full_error
}

pub(crate) fn kdl_value_to_json(value: &kdl::KdlValue) -> serde_json::Value {
    if let Some(s) = value.as_string() {
        serde_json::Value::String(s.to_string())
    } else if let Some(i) = value.as_integer() {
        i64::try_from(i)
            .map(|i| serde_json::Value::Number(i.into()))
            .unwrap_or_else(|_| serde_json::Value::String(i.to_string()))
    } else if let Some(f) = value.as_float() {
        serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    } else if let Some(b) = value.as_bool() {
        serde_json::Value::Bool(b)
    } else {
        serde_json::Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_simple_variable_expansion() {
        let mut processor = TemplateProcessor::new();
        processor.add_variable("account", serde_json::Value::String("prod-aws".to_string()));

        let result = processor
            .render_str(r#"account_name "{{ account }}""#)
            .unwrap();
        assert_eq!(result, r#"account_name "prod-aws""#);
    }

    #[test]
    fn test_if_condition() {
        let mut processor = TemplateProcessor::new();
        processor.add_variable("is_prod", serde_json::Value::Bool(true));

        let template = r#"
{% if is_prod %}
gw_size "c5.xlarge"
{% else %}
gw_size "t3.small"
{% endif %}
"#;
        let result = processor.render_str(template).unwrap();
        assert!(result.contains("c5.xlarge"));
        assert!(!result.contains("t3.small"));
    }

    #[test]
    fn test_undefined_variable_is_named() {
        let mut processor = TemplateProcessor::new();
        let err = processor.render_str("{{ missing }}").unwrap_err();
        assert!(err.to_string().contains("missing"), "{err}");
    }

    #[test]
    fn test_extract_variables() {
        let kdl = r#"
variables {
    account "prod-aws"
    cloud 1
    ha #true
}

gateway "{{ account }}-gw" {
    cloud_type {{ cloud }}
}
"#;
        let vars = extract_variables(kdl).unwrap();
        assert_eq!(vars.get("account").unwrap(), "prod-aws");
        assert_eq!(vars.get("cloud").unwrap(), 1);
        assert_eq!(vars.get("ha").unwrap(), true);
    }

    #[test]
    fn test_later_variables_block_wins() {
        let kdl = r#"
variables {
    region "us-east-1"
}
variables {
    region "eu-west-1"
}
"#;
        let vars = extract_variables(kdl).unwrap();
        assert_eq!(vars.get("region").unwrap(), "eu-west-1");
    }

    #[test]
    fn test_env_file_variables() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "ACCOUNT=\"dev-aws\"").unwrap();
        writeln!(file, "REGION='us-west-2'").unwrap();

        let mut processor = TemplateProcessor::new();
        processor.add_env_file_variables(file.path()).unwrap();
        let result = processor.render_str("{{ ACCOUNT }}/{{ REGION }}").unwrap();
        assert_eq!(result, "dev-aws/us-west-2");
    }

    #[test]
    #[serial_test::serial]
    fn test_env_prefix_is_stripped() {
        temp_env::with_vars(
            [
                ("MESHFORM_VAR_region", Some("ap-northeast-1")),
                ("SECRET_TOKEN", Some("hidden")),
            ],
            || {
                let mut processor = TemplateProcessor::new();
                processor.add_env_variables();
                assert_eq!(processor.render_str("{{ region }}").unwrap(), "ap-northeast-1");
                assert!(processor.render_str("{{ SECRET_TOKEN }}").is_err());
            },
        );
    }
}
