use crate::constants::rate_limit::DEFAULT_CLIENT_ID;
use crate::errors::ToolError;
use crate::mcp::envelope::{
    error_envelope, normalize, request_headers_view, tool_result, ErrorRequest,
};
use crate::services::auth::{AuthMode, AuthResolver};
use crate::services::config::AppConfig;
use crate::services::executor::{build_request, resolve_url, RequestExecutor};
use crate::services::logger::Logger;
use crate::services::rate_limit::AdmissionGate;
use crate::services::validation::{RequestSpec, Validation};
use crate::utils::headers::{merge_headers, Headers};
use crate::utils::redact::redact_url;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// The `test_request` operation: validate, admit, authenticate, execute, normalize.
#[derive(Clone)]
pub struct ApiManager {
    logger: Logger,
    config: Arc<AppConfig>,
    validation: Validation,
    gate: AdmissionGate,
    auth: Arc<AuthResolver>,
    executor: RequestExecutor,
}

impl ApiManager {
    pub fn new(
        logger: Logger,
        config: Arc<AppConfig>,
        validation: Validation,
        gate: AdmissionGate,
        auth: Arc<AuthResolver>,
        executor: RequestExecutor,
    ) -> Self {
        Self {
            logger: logger.child("api"),
            config,
            validation,
            gate,
            auth,
            executor,
        }
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.auth.mode()
    }

    fn security_event(&self, message: &str, meta: Value) {
        if self.config.security_logging {
            self.logger.warn(message, Some(&meta));
        }
    }

    /// Runs one call. `Err` is reserved for malformed arguments; every failure after
    /// validation comes back as an error-flagged tool result.
    pub async fn test_request(&self, args: Value) -> Result<Value, ToolError> {
        let trace_id = Uuid::new_v4().to_string();
        let base_url = self.config.base_url.as_deref();

        let spec = self
            .validation
            .validate_request(&args, base_url, self.config.allow_private_networks)
            .map_err(|err| {
                if err.code == "PRIVATE_NETWORK_BLOCKED" {
                    self.security_event(
                        "Blocked private network target",
                        serde_json::json!({ "trace_id": trace_id, "host": args.get("host") }),
                    );
                }
                err
            })?;
        let url = resolve_url(&spec, base_url)?;

        let _permit = match self.gate.acquire(DEFAULT_CLIENT_ID).await {
            Ok(permit) => permit,
            Err(err) => {
                self.security_event(
                    "Request rejected by admission gate",
                    serde_json::json!({ "trace_id": trace_id, "code": err.code }),
                );
                let headers = self.fallback_headers(&spec);
                return Ok(self.failure(&trace_id, &err, &spec, &url, headers));
            }
        };

        let auth = match self.auth.resolve(spec.options.as_ref()).await {
            Ok(auth) => auth,
            Err(err) => {
                let headers = self.fallback_headers(&spec);
                return Ok(self.failure(&trace_id, &err, &spec, &url, headers));
            }
        };

        let request = build_request(
            &spec,
            base_url,
            self.config.custom_headers(),
            &auth.headers,
        )?;
        let sanitizer = self.config.header_sanitizer();
        let headers_view =
            request_headers_view(sanitizer, &request.headers, &spec.headers, &auth.headers);

        self.logger.debug(
            "Dispatching request",
            Some(&serde_json::json!({
                "trace_id": trace_id,
                "method": request.method.as_str(),
                "url": redact_url(&request.url),
                "auth": auth.mode.as_str(),
            })),
        );

        let executed = match self.executor.execute(&request).await {
            Ok(executed) => executed,
            Err(err) => return Ok(self.failure(&trace_id, &err, &spec, &url, headers_view)),
        };

        if executed.response.status == 401
            && auth.mode == AuthMode::Dynamic
            && spec.options.is_none()
        {
            self.auth.invalidate_token();
            self.logger.info(
                "Upstream rejected cached token; next call will refresh",
                Some(&serde_json::json!({ "trace_id": trace_id })),
            );
        }

        let envelope = normalize(
            &executed,
            &request,
            headers_view,
            auth.mode,
            self.config.response_size_limit,
            sanitizer,
        );

        self.logger.info(
            "Request completed",
            Some(&serde_json::json!({
                "trace_id": trace_id,
                "method": request.method.as_str(),
                "url": redact_url(&request.url),
                "status": executed.response.status,
                "duration_ms": (executed.timing_ms * 100.0).round() / 100.0,
                "truncated": envelope.validation.truncated.is_some(),
            })),
        );

        Ok(tool_result(&envelope, false))
    }

    /// Headers known before credentials were resolved.
    fn fallback_headers(&self, spec: &RequestSpec) -> Headers {
        let merged = merge_headers([self.config.custom_headers(), &spec.headers]);
        request_headers_view(
            self.config.header_sanitizer(),
            &merged,
            &spec.headers,
            &Headers::new(),
        )
    }

    fn failure(
        &self,
        trace_id: &str,
        error: &ToolError,
        spec: &RequestSpec,
        url: &str,
        headers: Headers,
    ) -> Value {
        self.logger.warn(
            "Request failed",
            Some(&serde_json::json!({
                "trace_id": trace_id,
                "method": spec.method.as_str(),
                "url": redact_url(url),
                "code": error.code,
            })),
        );
        let body = if spec.method.allows_body() {
            spec.body.clone().unwrap_or(Value::Null)
        } else {
            Value::Null
        };
        let envelope = error_envelope(
            error,
            ErrorRequest {
                url: url.to_string(),
                method: spec.method.as_str().to_string(),
                headers,
                body,
            },
            self.config.detailed_errors,
        );
        tool_result(&envelope, true)
    }
}
