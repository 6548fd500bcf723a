use once_cell::sync::Lazy;
use regex::Regex;

static CONTROL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").expect("control char regex"));

/// Longest prefix of `value` that fits in `max_bytes` without splitting a code point.
pub fn truncate_utf8_prefix(value: &str, max_bytes: usize) -> String {
    if max_bytes == 0 {
        return String::new();
    }
    if value.len() <= max_bytes {
        return value.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}

/// Strips null bytes and C0/DEL control characters, keeping tab, LF and CR.
pub fn strip_control_chars(value: &str) -> String {
    if !CONTROL_CHARS.is_match(value) {
        return value.to_string();
    }
    CONTROL_CHARS.replace_all(value, "").to_string()
}

/// Like [`strip_control_chars`] but also drops line breaks and tabs (header values).
pub fn strip_all_control_chars(value: &str) -> String {
    value.chars().filter(|c| !c.is_control()).collect()
}

pub fn preview(value: &str, max_bytes: usize) -> String {
    if value.len() <= max_bytes {
        return value.to_string();
    }
    format!("{}...", truncate_utf8_prefix(value, max_bytes))
}
