use crate::errors::{ErrorCode, McpError};
use crate::services::config::AppConfig;
use crate::services::auth::AuthMode;
use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub const TEST_REQUEST_TOOL: &str = "test_request";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

static TOOL_CATALOG: Lazy<Vec<ToolDef>> = Lazy::new(|| {
    let raw = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tool_catalog.json"));
    serde_json::from_str(raw).expect("tool_catalog.json must be valid JSON")
});

static TOOL_VALIDATORS: Lazy<HashMap<String, JSONSchema>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for tool in TOOL_CATALOG.iter() {
        if let Ok(schema) = JSONSchema::compile(&tool.input_schema) {
            map.insert(tool.name.clone(), schema);
        }
    }
    map
});

pub fn tool_catalog() -> &'static Vec<ToolDef> {
    &TOOL_CATALOG
}

pub fn tool_by_name(name: &str) -> Option<&'static ToolDef> {
    TOOL_CATALOG.iter().find(|tool| tool.name == name)
}

/// Catalog as advertised by `tools/list`, with the live configuration appended to the
/// description so the caller knows which endpoint shape to use.
pub fn list_tools(config: &AppConfig, auth_mode: AuthMode) -> Vec<ToolDef> {
    TOOL_CATALOG
        .iter()
        .map(|tool| {
            let mut description = tool.description.clone();
            if tool.name == TEST_REQUEST_TOOL {
                description.push_str("\n\n");
                match config.base_url.as_deref() {
                    Some(base) => description.push_str(&format!(
                        "Base URL: {} (endpoint must be a path such as /users).",
                        base
                    )),
                    None => description.push_str(
                        "No base URL configured: endpoint must be a full URL, or pass host.",
                    ),
                }
                description.push_str(&format!(
                    "\nAuthentication: {}.\nResponse size limit: {} bytes.",
                    auth_mode.as_str(),
                    config.response_size_limit
                ));
                if !config.custom_headers().is_empty() {
                    let names: Vec<&str> =
                        config.custom_headers().keys().map(String::as_str).collect();
                    description.push_str(&format!("\nCustom headers: {}.", names.join(", ")));
                }
            }
            ToolDef {
                name: tool.name.clone(),
                description,
                input_schema: tool.input_schema.clone(),
            }
        })
        .collect()
}

pub fn validate_tool_args(tool_name: &str, args: &Value) -> Result<(), McpError> {
    let Some(schema) = TOOL_VALIDATORS.get(tool_name) else {
        return Ok(());
    };
    if let Err(errors) = schema.validate(args) {
        return Err(McpError::new(
            ErrorCode::InvalidParams,
            format_schema_errors(tool_name, errors),
        ));
    }
    Ok(())
}

fn format_schema_errors(tool_name: &str, errors: jsonschema::ErrorIterator) -> String {
    let mut lines = vec![format!("Invalid arguments for {}", tool_name)];
    for err in errors.take(10) {
        let path = err.instance_path.to_string();
        let path = if path.is_empty() { "(root)".to_string() } else { path };
        let line = match &err.kind {
            jsonschema::error::ValidationErrorKind::AdditionalProperties { unexpected } => {
                format!("{}: unknown field(s) {}", path, unexpected.join(", "))
            }
            jsonschema::error::ValidationErrorKind::Required { property } => format!(
                "{}: missing required field '{}'",
                path,
                property.as_str().map(str::to_string).unwrap_or_else(|| property.to_string())
            ),
            jsonschema::error::ValidationErrorKind::Enum { options } => {
                format!("{}: expected one of {}", path, options)
            }
            _ => format!("{}: {}", path, err),
        };
        lines.push(format!("- {}", line));
    }
    lines.join("\n")
}
