pub mod auth;
pub mod config;
pub mod custom_headers;
pub mod executor;
pub mod logger;
pub mod rate_limit;
pub mod transport;
pub mod validation;
