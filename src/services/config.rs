use crate::constants::{headers as header_constants, limits, network, rate_limit};
use crate::errors::ConfigError;
use crate::services::custom_headers::collect_custom_headers;
use crate::services::logger::Logger;
use crate::utils::feature_flags::{is_falsy, is_truthy};
use crate::utils::headers::Headers;
use crate::utils::redact::HeaderSanitizer;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::ffi::OsString;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeMode {
    Development,
    Production,
}

#[derive(Debug, Clone, Default)]
pub struct AuthSettings {
    pub basic_username: Option<String>,
    pub basic_password: Option<String>,
    pub bearer_token: Option<String>,
    pub api_key_header: Option<String>,
    pub api_key_value: Option<String>,
    pub token_provider: Option<String>,
    pub token_provider_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitSettings {
    pub max_concurrent: usize,
    pub max_requests: usize,
    pub window_ms: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_concurrent: rate_limit::MAX_CONCURRENT,
            max_requests: rate_limit::MAX_REQUESTS,
            window_ms: rate_limit::WINDOW_MS,
        }
    }
}

/// Process-wide configuration, read once at startup and shared by reference.
#[derive(Debug)]
pub struct AppConfig {
    pub base_url: Option<String>,
    pub response_size_limit: usize,
    pub verify_tls: bool,
    pub timeout_ms: u64,
    pub max_redirects: usize,
    pub auth: AuthSettings,
    pub mode: RuntimeMode,
    pub allow_private_networks: bool,
    pub detailed_errors: bool,
    pub security_logging: bool,
    pub rate_limit: RateLimitSettings,
    header_vars: Vec<(String, String)>,
    custom_headers: OnceCell<Headers>,
    sanitizer: OnceCell<HeaderSanitizer>,
    logger: Logger,
}

struct VarLookup {
    vars: HashMap<String, String>,
}

impl VarLookup {
    fn get(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn flag(&self, key: &str) -> Option<bool> {
        let raw = self.get(key)?;
        if is_truthy(&raw) {
            Some(true)
        } else if is_falsy(&raw) {
            Some(false)
        } else {
            None
        }
    }

    fn number(&self, key: &str, default: u64, min: u64, max: u64) -> Result<u64, ConfigError> {
        let Some(raw) = self.get(key) else {
            return Ok(default);
        };
        let value = raw.parse::<u64>().map_err(|_| ConfigError::NotANumber {
            name: key.to_string(),
            value: raw.clone(),
        })?;
        if value < min || value > max {
            return Err(ConfigError::OutOfRange {
                name: key.to_string(),
                value,
                min,
                max,
            });
        }
        Ok(value)
    }
}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let parsed = Url::parse(raw).map_err(|err| ConfigError::InvalidUrl {
        name: "REST_BASE_URL".to_string(),
        reason: err.to_string(),
    })?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ConfigError::InvalidUrl {
            name: "REST_BASE_URL".to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    Ok(raw.trim_end_matches('/').to_string())
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_os_vars(std::env::vars_os())
    }

    /// Like [`AppConfig::from_vars`], skipping entries that are not valid Unicode.
    pub fn from_os_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        Self::from_vars(vars.into_iter().filter_map(|(key, value)| {
            Some((key.into_string().ok()?, value.into_string().ok()?))
        }))
    }

    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let lookup = VarLookup {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        };

        let base_url = lookup
            .get("REST_BASE_URL")
            .map(|raw| normalize_base_url(&raw))
            .transpose()?;

        let response_size_limit = lookup.number(
            "REST_RESPONSE_SIZE_LIMIT",
            limits::DEFAULT_RESPONSE_SIZE_LIMIT as u64,
            1,
            limits::MAX_RESPONSE_SIZE_LIMIT as u64,
        )? as usize;

        let mode = match lookup.get("REST_ENV").map(|v| v.to_lowercase()) {
            Some(env) if env == "development" || env == "dev" => RuntimeMode::Development,
            _ => RuntimeMode::Production,
        };
        let development = mode == RuntimeMode::Development;

        let auth = AuthSettings {
            basic_username: lookup.get("AUTH_BASIC_USERNAME"),
            basic_password: lookup.get("AUTH_BASIC_PASSWORD"),
            bearer_token: lookup.get("AUTH_BEARER"),
            api_key_header: lookup.get("AUTH_APIKEY_HEADER_NAME"),
            api_key_value: lookup.get("AUTH_APIKEY_VALUE"),
            token_provider: lookup.get("AUTH_TOKEN_PROVIDER"),
            token_provider_timeout_ms: lookup.number(
                "AUTH_TOKEN_PROVIDER_TIMEOUT_MS",
                network::TIMEOUT_TOKEN_PROVIDER_MS,
                1,
                600_000,
            )?,
        };

        let rate_limit = RateLimitSettings {
            max_concurrent: lookup.number(
                "REST_MAX_CONCURRENT",
                rate_limit::MAX_CONCURRENT as u64,
                1,
                10_000,
            )? as usize,
            max_requests: lookup.number(
                "REST_RATE_LIMIT_MAX",
                rate_limit::MAX_REQUESTS as u64,
                1,
                1_000_000,
            )? as usize,
            window_ms: lookup.number(
                "REST_RATE_LIMIT_WINDOW_MS",
                rate_limit::WINDOW_MS,
                1,
                86_400_000,
            )?,
        };

        let prefix = header_constants::CUSTOM_PREFIX;
        let mut header_vars: Vec<(String, String)> = lookup
            .vars
            .iter()
            .filter(|(key, _)| {
                key.len() > prefix.len()
                    && key.is_char_boundary(prefix.len())
                    && key[..prefix.len()].eq_ignore_ascii_case(prefix)
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        header_vars.sort();

        Ok(Self {
            base_url,
            response_size_limit,
            verify_tls: lookup.flag("REST_ENABLE_SSL_VERIFY").unwrap_or(true),
            timeout_ms: lookup.number(
                "REST_TIMEOUT_MS",
                network::TIMEOUT_API_REQUEST_MS,
                1,
                3_600_000,
            )?,
            max_redirects: lookup.number(
                "REST_MAX_REDIRECTS",
                network::MAX_REDIRECTS as u64,
                0,
                50,
            )? as usize,
            auth,
            mode,
            allow_private_networks: development
                || lookup.flag("REST_ALLOW_PRIVATE_NETWORKS").unwrap_or(false),
            detailed_errors: development || lookup.flag("REST_DETAILED_ERRORS").unwrap_or(false),
            security_logging: lookup.flag("REST_SECURITY_LOGGING").unwrap_or(true),
            rate_limit,
            header_vars,
            custom_headers: OnceCell::new(),
            sanitizer: OnceCell::new(),
            logger: Logger::new("rest-probe").child("config"),
        })
    }

    /// Custom headers from `HEADER_*` variables, computed on first use and kept for the
    /// lifetime of the process.
    pub fn custom_headers(&self) -> &Headers {
        self.custom_headers
            .get_or_init(|| collect_custom_headers(&self.header_vars, &self.logger))
    }

    pub fn header_sanitizer(&self) -> &HeaderSanitizer {
        self.sanitizer.get_or_init(|| {
            HeaderSanitizer::new(
                self.auth.api_key_header.as_deref(),
                self.custom_headers().keys(),
            )
        })
    }

    pub fn is_development(&self) -> bool {
        self.mode == RuntimeMode::Development
    }
}
