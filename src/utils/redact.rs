use crate::constants::headers::{REDACTION_MARKER, SAFE, SANITIZER_CACHE_SIZE, SENSITIVE};
use crate::utils::headers::Headers;
use crate::utils::text::preview;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use url::Url;

const INLINE_REDACTION: &str = "***REDACTED***";

static INLINE_REDACTION_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"\beyJ[a-zA-Z0-9_-]{10,}\.[a-zA-Z0-9_-]{10,}\.[a-zA-Z0-9_-]{10,}\b")
                .expect("inline redaction regex"),
            INLINE_REDACTION,
        ),
        (
            Regex::new(r"\b(Bearer|Basic)\s+([A-Za-z0-9._~+/=-]{6,})").expect("inline redaction regex"),
            "$1 ***REDACTED***",
        ),
        (
            Regex::new(r#"\b(password|passwd|token|api[_-]?key|secret|access[_-]?token)\b\s*([:=])\s*([^\s"'`&]+)"#)
                .expect("inline redaction regex"),
            "$1$2***REDACTED***",
        ),
        (
            Regex::new(r"(https?://)[^/\s:@]+:[^/\s@]+@").expect("inline redaction regex"),
            "$1***REDACTED***@",
        ),
    ]
});

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

pub fn is_sensitive_header(name: &str) -> bool {
    SENSITIVE.contains(&normalize_key(name).as_str())
}

/// Redacts credentials that leak into free text (error messages, log lines).
pub fn redact_text(value: &str, max_bytes: usize) -> String {
    let mut out = value.to_string();
    for (re, replacement) in INLINE_REDACTION_PATTERNS.iter() {
        if re.is_match(&out) {
            out = re.replace_all(&out, *replacement).to_string();
        }
    }
    preview(&out, max_bytes)
}

/// Drops userinfo, query and fragment. Unparseable input is returned redacted.
pub fn redact_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return redact_text(raw, usize::MAX);
    };
    let _ = url.set_username("");
    let _ = url.set_password(None);
    url.set_query(None);
    url.set_fragment(None);
    url.to_string()
}

/// Redacts header values before they are surfaced to the caller or logged.
///
/// Caller-supplied headers only lose values in the fixed sensitive set. Headers that
/// originate from configuration, credentials or the upstream response are also redacted
/// when they carry the configured API-key header name, or when they are configured custom
/// headers outside the safe list. Everything else passes through unchanged.
#[derive(Debug)]
pub struct HeaderSanitizer {
    api_key_header: Option<String>,
    custom_names: HashSet<String>,
    cache: Mutex<HashMap<Vec<String>, Arc<HashSet<String>>>>,
}

impl HeaderSanitizer {
    pub fn new<I, S>(api_key_header: Option<&str>, custom_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            api_key_header: api_key_header
                .map(normalize_key)
                .filter(|name| !name.is_empty()),
            custom_names: custom_names
                .into_iter()
                .map(|name| normalize_key(name.as_ref()))
                .collect(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn sanitize(&self, headers: &Headers, caller_supplied: bool) -> Headers {
        if caller_supplied {
            return headers
                .iter()
                .map(|(name, value)| {
                    if is_sensitive_header(name) {
                        (name.clone(), REDACTION_MARKER.to_string())
                    } else {
                        (name.clone(), value.clone())
                    }
                })
                .collect();
        }

        let redacted = self.redacted_names(headers);
        headers
            .iter()
            .map(|(name, value)| {
                if redacted.contains(&normalize_key(name)) {
                    (name.clone(), REDACTION_MARKER.to_string())
                } else {
                    (name.clone(), value.clone())
                }
            })
            .collect()
    }

    fn should_redact(&self, lower: &str) -> bool {
        if lower == "authorization" || SENSITIVE.contains(&lower) {
            return true;
        }
        if self.api_key_header.as_deref() == Some(lower) {
            return true;
        }
        self.custom_names.contains(lower) && !SAFE.contains(&lower)
    }

    fn redacted_names(&self, headers: &Headers) -> Arc<HashSet<String>> {
        let mut key: Vec<String> = headers.keys().map(|name| normalize_key(name)).collect();
        key.sort();
        key.dedup();

        if let Ok(cache) = self.cache.lock() {
            if let Some(hit) = cache.get(&key) {
                return hit.clone();
            }
        }

        let names: HashSet<String> = key
            .iter()
            .filter(|name| self.should_redact(name))
            .cloned()
            .collect();
        let names = Arc::new(names);

        if let Ok(mut cache) = self.cache.lock() {
            if cache.len() >= SANITIZER_CACHE_SIZE {
                cache.clear();
            }
            cache.insert(key, names.clone());
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Headers {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn configured_headers_redact_authorization_in_any_case() {
        let sanitizer = HeaderSanitizer::new(None, Vec::<String>::new());
        for name in ["authorization", "Authorization", "AUTHORIZATION"] {
            let out = sanitizer.sanitize(&headers(&[(name, "Basic abc")]), false);
            assert_eq!(out[name], REDACTION_MARKER);
        }
    }

    #[test]
    fn configured_headers_redact_api_key_and_unsafe_custom_headers() {
        let sanitizer = HeaderSanitizer::new(Some("X-Service-Key"), ["X-Tenant", "Accept-Language"]);
        let out = sanitizer.sanitize(
            &headers(&[
                ("x-service-key", "k"),
                ("X-Tenant", "acme"),
                ("Accept-Language", "en"),
                ("X-Unlisted", "kept"),
            ]),
            false,
        );
        assert_eq!(out["x-service-key"], REDACTION_MARKER);
        assert_eq!(out["X-Tenant"], REDACTION_MARKER);
        assert_eq!(out["Accept-Language"], "en");
        assert_eq!(out["X-Unlisted"], "kept");
    }

    #[test]
    fn caller_headers_only_lose_sensitive_values() {
        let sanitizer = HeaderSanitizer::new(Some("X-Service-Key"), ["X-Tenant"]);
        let out = sanitizer.sanitize(
            &headers(&[
                ("Cookie", "session=1"),
                ("X-Tenant", "acme"),
                ("X-Service-Key", "visible-to-caller"),
            ]),
            true,
        );
        assert_eq!(out["Cookie"], REDACTION_MARKER);
        assert_eq!(out["X-Tenant"], "acme");
        assert_eq!(out["X-Service-Key"], "visible-to-caller");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let sanitizer = HeaderSanitizer::new(Some("X-Key"), ["X-Custom"]);
        let input = headers(&[
            ("Authorization", "Bearer t"),
            ("X-Key", "v"),
            ("X-Custom", "c"),
            ("Content-Type", "application/json"),
        ]);
        for caller_supplied in [false, true] {
            let once = sanitizer.sanitize(&input, caller_supplied);
            let twice = sanitizer.sanitize(&once, caller_supplied);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn cached_decision_matches_uncached() {
        let sanitizer = HeaderSanitizer::new(None, ["X-Custom"]);
        let input = headers(&[("X-Custom", "1"), ("Accept", "*/*")]);
        let first = sanitizer.sanitize(&input, false);
        let second = sanitizer.sanitize(&input, false);
        assert_eq!(first, second);
        assert_eq!(second["X-Custom"], REDACTION_MARKER);
    }

    #[test]
    fn redact_text_hides_inline_credentials() {
        let out = redact_text("sent Authorization: Bearer abcdef123456 to api", usize::MAX);
        assert!(!out.contains("abcdef123456"));
        let out = redact_text("GET https://user:pw@example.com/x?token=abc", usize::MAX);
        assert!(!out.contains("user:pw"));
        assert!(!out.contains("token=abc"));
    }

    #[test]
    fn redact_url_drops_userinfo_and_query() {
        assert_eq!(
            redact_url("https://u:p@api.example.com/v1/users?key=1#frag"),
            "https://api.example.com/v1/users"
        );
    }
}
