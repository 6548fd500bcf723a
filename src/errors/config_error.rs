use crate::errors::ToolError;
use thiserror::Error;

/// Startup configuration failures. Any of these aborts the process.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a positive integer (got {value:?})")]
    NotANumber { name: String, value: String },

    #[error("{name} must be between {min} and {max} (got {value})")]
    OutOfRange {
        name: String,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("{name} is not a valid http(s) URL: {reason}")]
    InvalidUrl { name: String, reason: String },
}

impl From<ConfigError> for ToolError {
    fn from(err: ConfigError) -> Self {
        ToolError::internal(err.to_string()).with_code("CONFIG_ERROR")
    }
}
