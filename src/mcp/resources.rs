use crate::constants::resources::URI_SCHEME;
use crate::errors::McpError;
use serde_json::Value;

struct Resource {
    name: &'static str,
    title: &'static str,
    description: &'static str,
    body: &'static str,
}

const RESOURCES: &[Resource] = &[
    Resource {
        name: "examples",
        title: "Usage examples",
        description: "Example test_request calls for common scenarios",
        body: include_str!("../../docs/resources/examples.md"),
    },
    Resource {
        name: "response-format",
        title: "Response format",
        description: "Shape of the response and error envelopes",
        body: include_str!("../../docs/resources/response-format.md"),
    },
    Resource {
        name: "config",
        title: "Configuration",
        description: "Environment variables and authentication setup",
        body: include_str!("../../docs/resources/config.md"),
    },
    Resource {
        name: "security",
        title: "Security",
        description: "Redaction, private network policy and limits",
        body: include_str!("../../docs/resources/security.md"),
    },
];

pub fn list_resources() -> Value {
    let resources: Vec<Value> = RESOURCES
        .iter()
        .map(|resource| {
            serde_json::json!({
                "uri": format!("{}{}", URI_SCHEME, resource.name),
                "name": resource.title,
                "description": resource.description,
                "mimeType": "text/markdown",
            })
        })
        .collect();
    serde_json::json!({ "resources": resources })
}

pub fn read_resource(uri: &str) -> Result<Value, McpError> {
    let name = uri.strip_prefix(URI_SCHEME).unwrap_or("");
    let resource = RESOURCES
        .iter()
        .find(|resource| resource.name == name)
        .ok_or_else(|| McpError::invalid_request(format!("Unknown resource: {}", uri)))?;
    Ok(serde_json::json!({
        "contents": [{
            "uri": uri,
            "mimeType": "text/markdown",
            "text": resource.body,
        }]
    }))
}
