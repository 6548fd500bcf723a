use crate::constants::headers::REDACTION_MARKER;
use crate::errors::ToolError;
use crate::services::auth::AuthMode;
use crate::services::executor::{Executed, ResolvedRequest};
use crate::utils::headers::{has_header, insert_header, Headers};
use crate::utils::redact::{redact_text, HeaderSanitizer};
use crate::utils::text::truncate_utf8_prefix;
use serde::Serialize;
use serde_json::Value;

const GENERIC_ERROR_MESSAGE: &str = "An error occurred while processing the request";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSummary {
    pub url: String,
    pub method: String,
    pub headers: Headers,
    pub body: Value,
    pub auth_method: AuthMode,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSummary {
    pub status_code: u16,
    pub status_text: String,
    pub timing: String,
    pub headers: Headers,
    pub body: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Truncation {
    pub original_size: usize,
    pub returned_size: usize,
    pub truncation_point: usize,
    pub size_limit: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub is_error: bool,
    pub messages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated: Option<Truncation>,
}

/// What a successful `test_request` call returns.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope {
    pub request: RequestSummary,
    pub response: ResponseSummary,
    pub validation: ValidationSummary,
}

/// Request as known at the point of failure.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRequest {
    pub url: String,
    pub method: String,
    pub headers: Headers,
    pub body: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub message: String,
    pub code: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    pub request: ErrorRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorDetail,
}

/// Header view for the envelope: the merged set sanitized as configured headers, then the
/// caller's own headers layered back in caller form so they can see what they sent. Names
/// that collide with injected credentials stay redacted.
pub fn request_headers_view(
    sanitizer: &HeaderSanitizer,
    merged: &Headers,
    caller: &Headers,
    auth: &Headers,
) -> Headers {
    let mut view = sanitizer.sanitize(merged, false);
    for (name, value) in sanitizer.sanitize(caller, true) {
        if has_header(auth, &name) {
            continue;
        }
        insert_header(&mut view, &name, value);
    }
    view
}

/// Body as the caller sees it plus its measured byte size.
fn body_value(raw: &[u8]) -> (Value, String) {
    let text = String::from_utf8_lossy(raw).to_string();
    match serde_json::from_str::<Value>(&text) {
        Ok(parsed) if !text.trim().is_empty() => {
            let canonical = match &parsed {
                Value::String(inner) => inner.clone(),
                other => other.to_string(),
            };
            (parsed, canonical)
        }
        _ => (Value::String(text.clone()), text),
    }
}

pub fn format_timing(timing_ms: f64) -> String {
    format!("{:.2}ms", timing_ms)
}

/// Shapes a transport result into the public envelope, truncating the body to
/// `size_limit` bytes on a character boundary.
pub fn normalize(
    executed: &Executed,
    request: &ResolvedRequest,
    request_headers: Headers,
    auth_mode: AuthMode,
    size_limit: usize,
    sanitizer: &HeaderSanitizer,
) -> ResponseEnvelope {
    let response = &executed.response;
    let is_error = response.status >= 400;
    let mut messages = vec![if is_error {
        format!("Request failed with status {}", response.status)
    } else {
        "Request completed successfully".to_string()
    }];

    let (mut body, canonical) = body_value(&response.body);
    let original_size = canonical.len();
    let mut truncated = None;
    if original_size > size_limit {
        let kept = truncate_utf8_prefix(&canonical, size_limit);
        let returned_size = kept.len();
        messages.push(format!(
            "Response truncated: {} of {} bytes returned due to size limit ({} bytes)",
            returned_size, original_size, size_limit
        ));
        truncated = Some(Truncation {
            original_size,
            returned_size,
            truncation_point: returned_size,
            size_limit,
        });
        body = Value::String(kept);
    }

    ResponseEnvelope {
        request: RequestSummary {
            url: request.url.clone(),
            method: request.method.as_str().to_string(),
            headers: request_headers,
            body: request.body.clone().unwrap_or(Value::Null),
            auth_method: auth_mode,
        },
        response: ResponseSummary {
            status_code: response.status,
            status_text: response.status_text.clone(),
            timing: format_timing(executed.timing_ms),
            headers: sanitizer.sanitize(&response.headers, false),
            body,
        },
        validation: ValidationSummary {
            is_error,
            messages,
            truncated,
        },
    }
}

/// Error envelope for failures after validation. Without detailed errors the message, URL
/// and body are replaced by fixed markers; the code is always kept.
pub fn error_envelope(error: &ToolError, request: ErrorRequest, detailed: bool) -> ErrorEnvelope {
    let (message, hint, request) = if detailed {
        (
            redact_text(&error.message, usize::MAX),
            error.hint.clone(),
            request,
        )
    } else {
        (
            GENERIC_ERROR_MESSAGE.to_string(),
            None,
            ErrorRequest {
                url: REDACTION_MARKER.to_string(),
                body: Value::String(REDACTION_MARKER.to_string()),
                ..request
            },
        )
    };
    ErrorEnvelope {
        error: ErrorDetail {
            message,
            code: error.code.clone(),
            retryable: error.retryable,
            hint,
            request,
        },
    }
}

/// MCP tool result carrying the pretty-printed payload as a single text block.
pub fn tool_result<T: Serialize>(payload: &T, is_error: bool) -> Value {
    let text = serde_json::to_string_pretty(payload).unwrap_or_else(|_| "{}".to_string());
    serde_json::json!({
        "content": [{ "type": "text", "text": text }],
        "isError": is_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::transport::TransportResponse;
    use crate::services::validation::HttpMethod;
    use serde_json::json;

    fn sanitizer() -> HeaderSanitizer {
        HeaderSanitizer::new(Some("X-Service-Key"), ["X-Tenant"])
    }

    fn executed(status: u16, body: &str) -> Executed {
        let mut headers = Headers::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        headers.insert("set-cookie".to_string(), "session=abc".to_string());
        Executed {
            response: TransportResponse {
                status,
                status_text: "OK".to_string(),
                headers,
                body: body.as_bytes().to_vec(),
            },
            timing_ms: 12.3456,
        }
    }

    fn request() -> ResolvedRequest {
        ResolvedRequest {
            url: "http://localhost:3000/users".to_string(),
            method: HttpMethod::Get,
            headers: Headers::new(),
            body: None,
        }
    }

    #[test]
    fn small_json_body_is_returned_parsed() {
        let envelope = normalize(
            &executed(200, r#"{"id":1}"#),
            &request(),
            Headers::new(),
            AuthMode::None,
            100,
            &sanitizer(),
        );
        assert_eq!(envelope.response.body, json!({"id": 1}));
        assert!(!envelope.validation.is_error);
        assert_eq!(envelope.validation.messages, vec!["Request completed successfully"]);
        assert!(envelope.validation.truncated.is_none());
        assert_eq!(envelope.response.timing, "12.35ms");
        assert_eq!(envelope.response.headers["set-cookie"], "[REDACTED]");
        assert_eq!(envelope.request.body, Value::Null);
    }

    #[test]
    fn oversized_body_is_cut_on_a_char_boundary() {
        let envelope = normalize(
            &executed(200, "0123456789ABCDEF"),
            &request(),
            Headers::new(),
            AuthMode::None,
            10,
            &sanitizer(),
        );
        assert_eq!(envelope.response.body, json!("0123456789"));
        let truncated = envelope.validation.truncated.expect("truncated");
        assert_eq!(truncated.original_size, 16);
        assert_eq!(truncated.returned_size, 10);
        assert_eq!(truncated.truncation_point, 10);
        assert_eq!(truncated.size_limit, 10);
        assert_eq!(envelope.validation.messages.len(), 2);

        let multibyte = normalize(
            &executed(200, "ééééé"),
            &request(),
            Headers::new(),
            AuthMode::None,
            5,
            &sanitizer(),
        );
        assert_eq!(multibyte.response.body, json!("éé"));
        assert_eq!(multibyte.validation.truncated.expect("t").returned_size, 4);
    }

    #[test]
    fn error_status_is_flagged() {
        let envelope = normalize(
            &executed(404, "missing"),
            &request(),
            Headers::new(),
            AuthMode::Bearer,
            100,
            &sanitizer(),
        );
        assert!(envelope.validation.is_error);
        assert_eq!(envelope.validation.messages[0], "Request failed with status 404");
        let payload = serde_json::to_value(&envelope).expect("json");
        assert_eq!(payload["request"]["authMethod"], "bearer");
        assert_eq!(payload["response"]["statusCode"], 404);
        assert_eq!(payload["validation"]["isError"], true);
    }

    #[test]
    fn caller_headers_stay_visible_but_credentials_do_not() {
        let merged: Headers = [
            ("Authorization", "Basic YWRtaW46c2VjcmV0"),
            ("X-Tenant", "acme"),
            ("X-Request", "mine"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let mut caller = Headers::new();
        caller.insert("X-Request".to_string(), "mine".to_string());
        caller.insert("Authorization".to_string(), "Bearer caller".to_string());
        let mut auth = Headers::new();
        auth.insert("Authorization".to_string(), "Basic YWRtaW46c2VjcmV0".to_string());

        let view = request_headers_view(&sanitizer(), &merged, &caller, &auth);
        assert_eq!(view["Authorization"], "[REDACTED]");
        assert_eq!(view["X-Tenant"], "[REDACTED]");
        assert_eq!(view["X-Request"], "mine");
    }

    #[test]
    fn error_envelope_hides_details_unless_enabled() {
        let error = ToolError::transport("Connection failed: refused").with_code("CONNECTION_FAILED");
        let request = ErrorRequest {
            url: "http://127.0.0.1:9/x".to_string(),
            method: "POST".to_string(),
            headers: Headers::new(),
            body: json!({"a": 1}),
        };
        let hidden = error_envelope(&error, request.clone(), false);
        assert_eq!(hidden.error.message, GENERIC_ERROR_MESSAGE);
        assert_eq!(hidden.error.request.url, "[REDACTED]");
        assert_eq!(hidden.error.code, "CONNECTION_FAILED");

        let shown = error_envelope(&error, request, true);
        assert_eq!(shown.error.message, "Connection failed: refused");
        assert_eq!(shown.error.request.body, json!({"a": 1}));
    }

    #[test]
    fn tool_result_wraps_pretty_text() {
        let result = tool_result(&json!({"a": 1}), true);
        assert_eq!(result["isError"], true);
        assert_eq!(result["content"][0]["type"], "text");
        assert!(result["content"][0]["text"].as_str().expect("text").contains("\n"));
    }
}
