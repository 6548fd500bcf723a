pub mod feature_flags;
pub mod headers;
pub mod redact;
pub mod text;
