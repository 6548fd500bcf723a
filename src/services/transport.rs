use crate::constants::limits::LOG_SUBSTRING_LENGTH;
use crate::errors::ToolError;
use crate::services::config::AppConfig;
use crate::services::validation::HttpMethod;
use crate::utils::headers::Headers;
use crate::utils::redact::{redact_text, redact_url};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::error::Error as _;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

/// "Send this request, give back status, headers and body." Any HTTP status is a
/// successful send; only network-level failures are errors.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, ToolError>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn from_config(config: &AppConfig) -> Result<Self, ToolError> {
        let redirect = if config.max_redirects == 0 {
            reqwest::redirect::Policy::none()
        } else {
            reqwest::redirect::Policy::limited(config.max_redirects)
        };
        let mut builder = Client::builder()
            .redirect(redirect)
            .timeout(Duration::from_millis(config.timeout_ms));
        if !config.verify_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|err| ToolError::internal(format!("Failed to build HTTP client: {}", err)))?;
        Ok(Self { client })
    }
}

fn to_header_map(headers: &Headers) -> Result<HeaderMap, ToolError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            ToolError::invalid_params(format!("Invalid header name: {}", name))
        })?;
        let header_value = HeaderValue::from_bytes(value.as_bytes()).map_err(|_| {
            ToolError::invalid_params(format!("Invalid value for header {}", name))
        })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

fn from_header_map(headers: &HeaderMap) -> Headers {
    let mut out = Headers::new();
    for (name, value) in headers {
        let text = String::from_utf8_lossy(value.as_bytes()).to_string();
        out.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&text);
            })
            .or_insert(text);
    }
    out
}

/// Maps a reqwest failure onto the transport error kinds. The URL embedded in reqwest's
/// message is stripped of credentials and query first.
pub fn map_reqwest_error(err: reqwest::Error) -> ToolError {
    let url = err.url().map(|u| redact_url(u.as_str()));
    let is_timeout = err.is_timeout();
    let is_connect = err.is_connect();
    let err = err.without_url();
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    let message = redact_text(&message, LOG_SUBSTRING_LENGTH * 2);

    let error = if is_timeout {
        ToolError::timeout(format!("Request timed out: {}", message))
    } else if is_connect {
        ToolError::transport(format!("Connection failed: {}", message))
            .with_code("CONNECTION_FAILED")
    } else {
        ToolError::transport(message)
    };
    match url {
        Some(url) => error.with_details(serde_json::json!({ "url": url })),
        None => error,
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, ToolError> {
        let mut builder = self
            .client
            .request(reqwest::Method::from(request.method), &request.url)
            .headers(to_header_map(&request.headers)?);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let headers = from_header_map(response.headers());
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        Ok(TransportResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            body: body.to_vec(),
        })
    }
}
