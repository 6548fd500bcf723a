use crate::constants::headers::{DEFAULT_ACCEPT, DEFAULT_USER_AGENT};
use crate::errors::ToolError;
use crate::services::transport::{HttpTransport, OutboundRequest, TransportResponse};
use crate::services::validation::{looks_like_full_url, HttpMethod, RequestSpec};
use crate::utils::headers::{has_header, insert_header, merge_headers, Headers};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Fully built outbound request for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRequest {
    pub url: String,
    pub method: HttpMethod,
    pub headers: Headers,
    /// Body actually sent. Always `None` for GET and DELETE.
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct Executed {
    pub response: TransportResponse,
    pub timing_ms: f64,
}

/// Single leading slash, no trailing slash.
pub fn normalize_endpoint(endpoint: &str) -> String {
    format!("/{}", endpoint.trim().trim_matches('/'))
}

/// Absolute target URL: full-URL endpoints verbatim (`www.` gets `https://`), otherwise the
/// host override or base origin joined with the normalized path.
pub fn resolve_url(spec: &RequestSpec, base_url: Option<&str>) -> Result<String, ToolError> {
    let endpoint = spec.endpoint.trim();
    if looks_like_full_url(endpoint) {
        if endpoint.len() >= 4 && endpoint[..4].eq_ignore_ascii_case("www.") {
            return Ok(format!("https://{}", endpoint));
        }
        return Ok(endpoint.to_string());
    }
    let origin = spec.host.as_deref().or(base_url).ok_or_else(|| {
        ToolError::invalid_params("endpoint must be a full URL when no base URL or host is set")
    })?;
    Ok(format!(
        "{}{}",
        origin.trim_end_matches('/'),
        normalize_endpoint(endpoint)
    ))
}

/// Priority, lowest first: client defaults, custom headers, caller headers, auth headers.
pub fn merge_request_headers(custom: &Headers, caller: &Headers, auth: &Headers) -> Headers {
    let mut defaults = Headers::new();
    defaults.insert("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string());
    defaults.insert("Accept".to_string(), DEFAULT_ACCEPT.to_string());
    merge_headers([&defaults, custom, caller, auth])
}

pub fn build_request(
    spec: &RequestSpec,
    base_url: Option<&str>,
    custom: &Headers,
    auth: &Headers,
) -> Result<ResolvedRequest, ToolError> {
    let url = resolve_url(spec, base_url)?;
    let mut headers = merge_request_headers(custom, &spec.headers, auth);
    let body = if spec.method.allows_body() {
        spec.body.clone()
    } else {
        None
    };
    if let Some(body) = &body {
        if !body.is_string() && !has_header(&headers, "content-type") {
            insert_header(&mut headers, "Content-Type", "application/json");
        }
    }
    Ok(ResolvedRequest {
        url,
        method: spec.method,
        headers,
        body,
    })
}

fn encode_body(body: &Value) -> Result<Vec<u8>, ToolError> {
    match body {
        Value::String(text) => Ok(text.clone().into_bytes()),
        other => serde_json::to_vec(other)
            .map_err(|err| ToolError::internal(format!("Failed to encode body: {}", err))),
    }
}

/// Issues resolved requests through the shared transport and times them.
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn HttpTransport>,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    pub async fn execute(&self, request: &ResolvedRequest) -> Result<Executed, ToolError> {
        let outbound = OutboundRequest {
            method: request.method,
            url: request.url.clone(),
            headers: request.headers.clone(),
            body: request.body.as_ref().map(encode_body).transpose()?,
        };
        let started = Instant::now();
        let response = self.transport.send(outbound).await?;
        let timing_ms = started.elapsed().as_secs_f64() * 1000.0;
        Ok(Executed {
            response,
            timing_ms,
        })
    }
}
