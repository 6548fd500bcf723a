use crate::errors::{ToolError, ToolErrorKind};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(i32)]
pub enum ErrorCode {
    ParseError = -32700,
    InvalidRequest = -32600,
    MethodNotFound = -32601,
    InvalidParams = -32602,
    InternalError = -32603,
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct McpError {
    pub code: ErrorCode,
    pub message: String,
}

impl McpError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    pub fn method_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MethodNotFound, message)
    }
}

impl From<&ToolError> for McpError {
    fn from(error: &ToolError) -> Self {
        let mut message = error.message.clone();
        if let Some(hint) = &error.hint {
            message.push_str("\nhint: ");
            message.push_str(hint);
        }
        match error.kind {
            ToolErrorKind::InvalidParams => McpError::new(ErrorCode::InvalidParams, message),
            _ => McpError::new(ErrorCode::InternalError, message),
        }
    }
}

impl fmt::Display for McpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for McpError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_errors_map_to_json_rpc_codes() {
        let invalid =
            McpError::from(&ToolError::invalid_params("bad endpoint").with_hint("use a path"));
        assert_eq!(invalid.code, ErrorCode::InvalidParams);
        assert_eq!(invalid.message, "bad endpoint\nhint: use a path");

        for error in [
            ToolError::busy("full"),
            ToolError::auth("provider down"),
            ToolError::internal("boom"),
        ] {
            assert_eq!(McpError::from(&error).code, ErrorCode::InternalError);
        }
    }
}
