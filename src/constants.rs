pub mod network {
    pub const TIMEOUT_API_REQUEST_MS: u64 = 30_000;
    pub const TIMEOUT_TOKEN_PROVIDER_MS: u64 = 10_000;
    pub const MAX_REDIRECTS: usize = 10;
}

pub mod limits {
    pub const MAX_ENDPOINT_LENGTH: usize = 2_048;
    pub const MAX_HOST_LENGTH: usize = 2_048;
    pub const MAX_REQUEST_HEADERS: usize = 50;
    pub const MAX_HEADER_NAME_LENGTH: usize = 256;
    pub const MAX_HEADER_VALUE_LENGTH: usize = 8_192;
    pub const MAX_CUSTOM_HEADERS: usize = 50;
    pub const DEFAULT_RESPONSE_SIZE_LIMIT: usize = 10_000;
    pub const MAX_RESPONSE_SIZE_LIMIT: usize = 52_428_800;
    pub const LOG_SUBSTRING_LENGTH: usize = 200;
}

pub mod rate_limit {
    pub const WINDOW_MS: u64 = 60_000;
    pub const MAX_REQUESTS: usize = 100;
    pub const MAX_CONCURRENT: usize = 10;
    pub const CLEANUP_INTERVAL_MS: u64 = 300_000;
    pub const SLOT_POLL_INTERVAL_MS: u64 = 50;
    pub const SLOT_POLL_ATTEMPTS: u32 = 10;
    pub const DEFAULT_CLIENT_ID: &str = "default";
}

pub mod auth {
    pub const TOKEN_EXPIRY_SKEW_MS: i64 = 60_000;
}

pub mod headers {
    pub const CUSTOM_PREFIX: &str = "HEADER_";
    pub const REDACTION_MARKER: &str = "[REDACTED]";
    pub const SANITIZER_CACHE_SIZE: usize = 100;
    pub const DEFAULT_USER_AGENT: &str = concat!("rest-probe/", env!("CARGO_PKG_VERSION"));
    pub const DEFAULT_ACCEPT: &str = "application/json, text/plain, */*";

    pub const SENSITIVE: &[&str] = &[
        "authorization",
        "cookie",
        "set-cookie",
        "x-api-key",
        "x-auth-token",
        "proxy-authorization",
        "www-authenticate",
    ];

    pub const SAFE: &[&str] = &[
        "accept",
        "accept-language",
        "content-type",
        "user-agent",
        "cache-control",
        "if-match",
        "if-none-match",
        "if-modified-since",
        "if-unmodified-since",
    ];
}

pub mod localhost {
    pub const NAMES: &[&str] = &["localhost", "127.0.0.1", "[::1]", "::1"];
    pub const PRIVATE_PREFIXES: &[&str] = &["192.168.", "10.", "172."];
}

pub mod protocols {
    pub const ALLOWED_HTTP: &[&str] = &["http:", "https:"];
}

pub mod methods {
    pub const ALLOWED: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH"];
    pub const WITH_BODY: &[&str] = &["POST", "PUT", "PATCH"];
}

pub mod resources {
    pub const URI_SCHEME: &str = "rest-api://";
}
