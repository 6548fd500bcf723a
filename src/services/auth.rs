use crate::constants::auth::TOKEN_EXPIRY_SKEW_MS;
use crate::errors::ToolError;
use crate::services::config::AuthSettings;
use crate::services::logger::Logger;
use crate::utils::headers::Headers;
use async_trait::async_trait;
use base64::Engine;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde::Serialize;
use serde_json::{Map, Value};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Which credential set is injected into outgoing requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuthMode {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "basic")]
    Basic,
    #[serde(rename = "bearer")]
    Bearer,
    #[serde(rename = "apikey")]
    ApiKey,
    #[serde(rename = "dynamic")]
    Dynamic,
}

impl AuthMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthMode::None => "none",
            AuthMode::Basic => "basic",
            AuthMode::Bearer => "bearer",
            AuthMode::ApiKey => "apikey",
            AuthMode::Dynamic => "dynamic",
        }
    }

    /// Fixed priority: basic > bearer > apikey > dynamic > none.
    pub fn from_settings(settings: &AuthSettings, has_provider: bool) -> Self {
        if settings.basic_username.is_some() && settings.basic_password.is_some() {
            AuthMode::Basic
        } else if settings.bearer_token.is_some() {
            AuthMode::Bearer
        } else if settings.api_key_header.is_some() && settings.api_key_value.is_some() {
            AuthMode::ApiKey
        } else if has_provider {
            AuthMode::Dynamic
        } else {
            AuthMode::None
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedAuth {
    pub mode: AuthMode,
    pub headers: Headers,
}

/// Source of tokens for dynamic auth.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch_token(&self, options: Option<&Map<String, Value>>) -> Result<String, ToolError>;
}

/// Runs an external command and reads a token from its stdout.
///
/// The command receives `{"options": ...}` on stdin and may answer with the raw token or
/// a JSON object carrying `token` (or `access_token`).
pub struct ExecTokenProvider {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ExecTokenProvider {
    pub fn new(command: &str, timeout: Duration) -> Option<Self> {
        let mut parts = command.split_whitespace().map(|s| s.to_string());
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            timeout,
        })
    }
}

fn parse_token_output(raw: &str) -> Result<String, ToolError> {
    let trimmed = raw.trim();
    let token = if trimmed.starts_with('{') {
        let parsed: Value = serde_json::from_str(trimmed)
            .map_err(|_| ToolError::auth("Token provider returned invalid JSON"))?;
        parsed
            .get("token")
            .or_else(|| parsed.get("access_token"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim()
            .to_string()
    } else {
        trimmed.to_string()
    };
    if token.is_empty() {
        return Err(ToolError::auth("Token provider did not return a token"));
    }
    Ok(token)
}

#[async_trait]
impl TokenProvider for ExecTokenProvider {
    async fn fetch_token(&self, options: Option<&Map<String, Value>>) -> Result<String, ToolError> {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let mut child = cmd
            .spawn()
            .map_err(|err| ToolError::auth(format!("Failed to start token provider: {}", err)))?;

        let stdin = child.stdin.take();
        let payload = serde_json::json!({ "options": options }).to_string();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                // A provider that ignores stdin may close it early.
                let _ = stdin.write_all(payload.as_bytes()).await;
            }
        };
        // The stdin write shares the deadline: a provider that never drains it must not
        // outlive the timeout. Dropping the child on expiry kills it.
        let run = async move {
            let ((), output) = tokio::join!(feed, child.wait_with_output());
            output
        };

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| {
                ToolError::auth("Token provider timed out").with_code("AUTH_PROVIDER_TIMEOUT")
            })?
            .map_err(|err| ToolError::auth(format!("Token provider failed: {}", err)))?;

        if !output.status.success() {
            return Err(ToolError::auth(format!(
                "Token provider exited with {}",
                output.status
            )));
        }
        parse_token_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Expiry in epoch milliseconds for JWT-shaped tokens carrying a numeric `exp` claim.
pub fn jwt_expiry_ms(token: &str) -> Option<i64> {
    let mut parts = token.split('.');
    let (_, payload, _) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?.as_f64()?;
    // Claims outside the representable millisecond range carry no usable expiry.
    if !exp.is_finite() || exp <= 0.0 || exp >= (i64::MAX / 1000) as f64 {
        return None;
    }
    Some((exp * 1000.0) as i64)
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at_ms: Option<i64>,
}

impl CachedToken {
    fn new(token: String) -> Self {
        let expires_at_ms = jwt_expiry_ms(&token);
        Self {
            token,
            expires_at_ms,
        }
    }

    fn is_fresh(&self, now_ms: i64) -> bool {
        match self.expires_at_ms {
            None => true,
            Some(expires_at) => now_ms < expires_at.saturating_sub(TOKEN_EXPIRY_SKEW_MS),
        }
    }
}

type TokenFuture = Shared<BoxFuture<'static, Result<CachedToken, ToolError>>>;

#[derive(Default)]
struct TokenSlot {
    cached: Option<CachedToken>,
    inflight: Option<TokenFuture>,
}

/// Single-slot token cache for the shared auth context.
///
/// Concurrent shared acquisitions await one in-flight provider call. Calls that carry
/// per-call options go straight to the provider and never read or write the slot.
pub struct TokenCache {
    provider: Arc<dyn TokenProvider>,
    slot: Mutex<TokenSlot>,
    logger: Logger,
}

impl TokenCache {
    pub fn new(provider: Arc<dyn TokenProvider>, logger: Logger) -> Self {
        Self {
            provider,
            slot: Mutex::new(TokenSlot::default()),
            logger: logger.child("tokens"),
        }
    }

    pub async fn token(
        &self,
        options: Option<&Map<String, Value>>,
        force_refresh: bool,
    ) -> Result<String, ToolError> {
        if let Some(options) = options.filter(|o| !o.is_empty()) {
            return self.provider.fetch_token(Some(options)).await;
        }

        let future = {
            let mut slot = self
                .slot
                .lock()
                .map_err(|_| ToolError::internal("Token cache lock poisoned"))?;
            if force_refresh {
                slot.cached = None;
            }
            let now_ms = chrono::Utc::now().timestamp_millis();
            if let Some(cached) = slot.cached.as_ref().filter(|c| c.is_fresh(now_ms)) {
                return Ok(cached.token.clone());
            }
            match slot.inflight.clone() {
                Some(inflight) => inflight,
                None => {
                    self.logger.debug("Acquiring token from provider", None);
                    let provider = self.provider.clone();
                    let fresh: TokenFuture = async move {
                        let token = provider.fetch_token(None).await?;
                        Ok::<_, ToolError>(CachedToken::new(token))
                    }
                    .boxed()
                    .shared();
                    slot.inflight = Some(fresh.clone());
                    fresh
                }
            }
        };

        let result = future.clone().await;

        if let Ok(mut slot) = self.slot.lock() {
            let same = slot
                .inflight
                .as_ref()
                .map(|inflight| inflight.ptr_eq(&future))
                .unwrap_or(false);
            if same {
                slot.inflight = None;
                if let Ok(token) = &result {
                    slot.cached = Some(token.clone());
                }
            }
        }

        result.map(|cached| cached.token)
    }

    pub fn invalidate(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            slot.cached = None;
        }
    }
}

/// Picks the active credential method and produces its headers.
pub struct AuthResolver {
    settings: AuthSettings,
    mode: AuthMode,
    tokens: Option<TokenCache>,
}

impl AuthResolver {
    pub fn new(settings: &AuthSettings, logger: Logger) -> Self {
        let provider = settings
            .token_provider
            .as_deref()
            .and_then(|command| {
                ExecTokenProvider::new(
                    command,
                    Duration::from_millis(settings.token_provider_timeout_ms),
                )
            })
            .map(|provider| Arc::new(provider) as Arc<dyn TokenProvider>);
        Self::with_provider(settings, provider, logger)
    }

    pub fn with_provider(
        settings: &AuthSettings,
        provider: Option<Arc<dyn TokenProvider>>,
        logger: Logger,
    ) -> Self {
        let logger = logger.child("auth");
        let mode = AuthMode::from_settings(settings, provider.is_some());
        let tokens = match mode {
            AuthMode::Dynamic => provider.map(|p| TokenCache::new(p, logger.clone())),
            _ => None,
        };
        Self {
            settings: settings.clone(),
            mode,
            tokens,
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub async fn resolve(
        &self,
        options: Option<&Map<String, Value>>,
    ) -> Result<ResolvedAuth, ToolError> {
        let mut headers = Headers::new();
        match self.mode {
            AuthMode::Basic => {
                let username = self.settings.basic_username.as_deref().unwrap_or("");
                let password = self.settings.basic_password.as_deref().unwrap_or("");
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", username, password));
                headers.insert("Authorization".to_string(), format!("Basic {}", encoded));
            }
            AuthMode::Bearer => {
                let token = self.settings.bearer_token.as_deref().unwrap_or("");
                headers.insert("Authorization".to_string(), format!("Bearer {}", token));
            }
            AuthMode::ApiKey => {
                if let (Some(name), Some(value)) = (
                    self.settings.api_key_header.as_deref(),
                    self.settings.api_key_value.as_deref(),
                ) {
                    headers.insert(name.to_string(), value.to_string());
                }
            }
            AuthMode::Dynamic => {
                if let Some(tokens) = &self.tokens {
                    let token = tokens.token(options, false).await?;
                    headers.insert("Authorization".to_string(), format!("Bearer {}", token));
                }
            }
            AuthMode::None => {}
        }
        Ok(ResolvedAuth {
            mode: self.mode,
            headers,
        })
    }

    /// Drops the shared cached token so the next shared acquisition refreshes.
    pub fn invalidate_token(&self) {
        if let Some(tokens) = &self.tokens {
            tokens.invalidate();
        }
    }
}
