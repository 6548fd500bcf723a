use crate::constants::{limits, localhost, methods, protocols::ALLOWED_HTTP};
use crate::errors::ToolError;
use crate::utils::headers::Headers;
use crate::utils::text::{strip_all_control_chars, strip_control_chars};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use url::Url;

static FULL_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(https?://|www\.)").expect("full url regex"));

static HEADER_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[!#$%&'*+.^_`|~0-9A-Za-z-]+$").expect("header token regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "DELETE" => Some(Self::Delete),
            "PATCH" => Some(Self::Patch),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }

    pub fn allows_body(self) -> bool {
        methods::WITH_BODY.contains(&self.as_str())
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
        }
    }
}

/// A validated `test_request` call. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub method: HttpMethod,
    pub endpoint: String,
    pub body: Option<Value>,
    pub headers: Headers,
    /// Normalized `origin + path` of the per-call host override.
    pub host: Option<String>,
    pub options: Option<serde_json::Map<String, Value>>,
}

pub fn looks_like_full_url(value: &str) -> bool {
    FULL_URL.is_match(value.trim())
}

/// Path (plus query) portion of a full URL; used to suggest the relative form.
fn path_of_full_url(value: &str) -> String {
    let candidate = if value.to_lowercase().starts_with("www.") {
        format!("https://{}", value)
    } else {
        value.to_string()
    };
    match Url::parse(&candidate) {
        Ok(url) => {
            let mut out = url.path().to_string();
            if let Some(query) = url.query() {
                out.push('?');
                out.push_str(query);
            }
            out
        }
        Err(_) => "/".to_string(),
    }
}

fn is_private_host(host: &str) -> bool {
    let host = host.to_lowercase();
    localhost::NAMES.contains(&host.as_str())
        || localhost::PRIVATE_PREFIXES
            .iter()
            .any(|prefix| host.starts_with(prefix))
}

#[derive(Clone)]
pub struct Validation;

impl Validation {
    pub fn new() -> Self {
        Self
    }

    pub fn ensure_string(
        &self,
        value: &Value,
        label: &str,
        trim: bool,
    ) -> Result<String, ToolError> {
        let text = value.as_str().ok_or_else(|| {
            ToolError::invalid_params(format!("{} must be a non-empty string", label))
        })?;
        let normalized = text.trim();
        if normalized.is_empty() {
            return Err(ToolError::invalid_params(format!(
                "{} must be a non-empty string",
                label
            )));
        }
        Ok(if trim {
            normalized.to_string()
        } else {
            text.to_string()
        })
    }

    pub fn ensure_optional_string(
        &self,
        value: Option<&Value>,
        label: &str,
        trim: bool,
    ) -> Result<Option<String>, ToolError> {
        match value {
            None => Ok(None),
            Some(val) if val.is_null() => Ok(None),
            Some(val) => self.ensure_string(val, label, trim).map(Some),
        }
    }

    pub fn ensure_optional_object(
        &self,
        value: Option<&Value>,
        label: &str,
    ) -> Result<Option<serde_json::Map<String, Value>>, ToolError> {
        match value {
            None => Ok(None),
            Some(val) if val.is_null() => Ok(None),
            Some(val) => val
                .as_object()
                .cloned()
                .map(Some)
                .ok_or_else(|| ToolError::invalid_params(format!("{} must be an object", label))),
        }
    }

    pub fn ensure_method(&self, value: Option<&Value>) -> Result<HttpMethod, ToolError> {
        let raw = self.ensure_string(value.unwrap_or(&Value::Null), "method", true)?;
        HttpMethod::parse(&raw).ok_or_else(|| {
            ToolError::invalid_params(format!(
                "method must be one of {} (got '{}')",
                methods::ALLOWED.join(", "),
                raw
            ))
        })
    }

    /// Strips control characters and enforces the length bound.
    pub fn ensure_endpoint(&self, value: Option<&Value>) -> Result<String, ToolError> {
        let raw = self.ensure_string(value.unwrap_or(&Value::Null), "endpoint", false)?;
        let cleaned = strip_control_chars(&raw).trim().to_string();
        if cleaned.is_empty() {
            return Err(ToolError::invalid_params("endpoint must be a non-empty string"));
        }
        let length = cleaned.chars().count();
        if length > limits::MAX_ENDPOINT_LENGTH {
            return Err(ToolError::invalid_params(format!(
                "endpoint exceeds maximum length ({} > {} characters)",
                length,
                limits::MAX_ENDPOINT_LENGTH
            )));
        }
        Ok(cleaned)
    }

    pub fn ensure_headers(&self, value: Option<&Value>) -> Result<Headers, ToolError> {
        let Some(value) = value else {
            return Ok(Headers::new());
        };
        if value.is_null() {
            return Ok(Headers::new());
        }
        let obj = value
            .as_object()
            .ok_or_else(|| ToolError::invalid_params("headers must be an object"))?;
        if obj.len() > limits::MAX_REQUEST_HEADERS {
            return Err(ToolError::invalid_params(format!(
                "Too many headers ({} > {})",
                obj.len(),
                limits::MAX_REQUEST_HEADERS
            )));
        }
        let mut out = Headers::new();
        for (key, val) in obj.iter() {
            let name = key.trim();
            if name.is_empty()
                || name.len() > limits::MAX_HEADER_NAME_LENGTH
                || !HEADER_TOKEN.is_match(name)
            {
                return Err(ToolError::invalid_params(format!(
                    "Invalid header name '{}'",
                    strip_all_control_chars(key)
                )));
            }
            let text = val.as_str().ok_or_else(|| {
                ToolError::invalid_params(format!("Header '{}' must have a string value", name))
            })?;
            let cleaned = strip_all_control_chars(text);
            if cleaned.len() > limits::MAX_HEADER_VALUE_LENGTH {
                return Err(ToolError::invalid_params(format!(
                    "Header '{}' value exceeds maximum length ({} bytes)",
                    name,
                    limits::MAX_HEADER_VALUE_LENGTH
                )));
            }
            out.insert(name.to_string(), cleaned);
        }
        Ok(out)
    }

    /// Parses a host override into `origin + path` without a trailing slash.
    pub fn ensure_host(&self, raw: &str, allow_private: bool) -> Result<String, ToolError> {
        let cleaned = strip_control_chars(raw).trim().to_string();
        if cleaned.chars().count() > limits::MAX_HOST_LENGTH {
            return Err(ToolError::invalid_params(format!(
                "host exceeds maximum length ({} characters)",
                limits::MAX_HOST_LENGTH
            )));
        }
        let url = Url::parse(&cleaned).map_err(|err| {
            ToolError::invalid_params(format!("Invalid host '{}': {}", cleaned, err))
                .with_hint("host must be an absolute URL such as \"https://api.example.com\"")
        })?;
        let scheme = format!("{}:", url.scheme());
        if !ALLOWED_HTTP.contains(&scheme.as_str()) {
            return Err(ToolError::invalid_params(format!(
                "Invalid host '{}': only http and https are supported",
                cleaned
            )));
        }
        let Some(hostname) = url.host_str() else {
            return Err(ToolError::invalid_params(format!(
                "Invalid host '{}': missing hostname",
                cleaned
            )));
        };
        if !allow_private && is_private_host(hostname) {
            return Err(ToolError::invalid_params(format!(
                "Private network access not allowed: {}",
                hostname
            ))
            .with_code("PRIVATE_NETWORK_BLOCKED")
            .with_hint("Set REST_ENV=development or REST_ALLOW_PRIVATE_NETWORKS=true to allow private targets."));
        }
        let path = url.path().trim_end_matches('/');
        Ok(format!("{}{}", url.origin().ascii_serialization(), path))
    }

    /// Validates `test_request` arguments against input and URL-shape policy.
    pub fn validate_request(
        &self,
        args: &Value,
        base_url: Option<&str>,
        allow_private: bool,
    ) -> Result<RequestSpec, ToolError> {
        if !args.is_object() {
            return Err(ToolError::invalid_params("arguments must be an object"));
        }
        let method = self.ensure_method(args.get("method"))?;
        let endpoint = self.ensure_endpoint(args.get("endpoint"))?;
        let headers = self.ensure_headers(args.get("headers"))?;
        let host = self
            .ensure_optional_string(args.get("host"), "host", true)?
            .map(|raw| self.ensure_host(&raw, allow_private))
            .transpose()?;
        let options = self
            .ensure_optional_object(args.get("options"), "options")?
            .filter(|map| !map.is_empty());
        let body = args.get("body").filter(|v| !v.is_null()).cloned();

        let full_url = looks_like_full_url(&endpoint);
        if let Some(host) = host.as_deref() {
            if full_url {
                return Err(ToolError::invalid_params(format!(
                    "Invalid endpoint format: endpoint must be a path when host is supplied (got '{}')",
                    endpoint
                ))
                .with_hint(format!(
                    "Use endpoint \"{}\" with host \"{}\".",
                    path_of_full_url(&endpoint),
                    host
                )));
            }
        } else if let Some(base) = base_url {
            if full_url {
                let path = path_of_full_url(&endpoint);
                return Err(ToolError::invalid_params(format!(
                    "Invalid endpoint format: REST_BASE_URL is configured ({base}), so endpoint must be a path. Use \"{path}\" instead, which resolves to {base}{path}."
                ))
                .with_hint(
                    "To call a different origin for a single request, pass host (e.g. \"https://api.example.com\") together with a path endpoint.",
                ));
            }
        } else if !full_url {
            return Err(ToolError::invalid_params(format!(
                "Invalid endpoint format: REST_BASE_URL is not configured, so endpoint must be a full URL (e.g. \"https://api.example.com{}\") or be combined with host.",
                if endpoint.starts_with('/') { endpoint.clone() } else { format!("/{}", endpoint) }
            )));
        }

        Ok(RequestSpec {
            method,
            endpoint,
            body,
            headers,
            host,
            options,
        })
    }
}

impl Default for Validation {
    fn default() -> Self {
        Self::new()
    }
}
